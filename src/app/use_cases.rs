//! Bedieneraktionen als Use-Cases über Registry, Layout und Bus.
//!
//! Laufen auf dem UI-Thread. Jede Aktion mutiert die Modelle und stößt
//! die betroffene Persistenz an; der Bus wird nur über den schmalen
//! `BusInterface`-Vertrag berührt.

use super::context::PanelContext;
use crate::core::layout::Track;
use crate::core::turnout::{EventId, TurnoutState};
use crate::lcc::BusInterface;
use anyhow::{bail, Context, Result};

/// Sendet einen Stellbefehl für die Weiche an `index`.
///
/// Das ausgelöste EventReport erreicht auch die eigene Rückmelde-Kette;
/// bis dahin bleibt `command_pending` gesetzt.
pub fn command_turnout(
    ctx: &PanelContext,
    bus: &dyn BusInterface,
    index: usize,
    target: TurnoutState,
) -> Result<()> {
    let turnout = ctx
        .registry
        .get(index)
        .with_context(|| format!("Keine Weiche an Index {}", index))?;

    let event = match target {
        TurnoutState::Normal => turnout.event_normal,
        TurnoutState::Reverse => turnout.event_reverse,
        other => bail!("Keine stellbare Zielposition: {:?}", other),
    };

    bus.send_event(event)
        .with_context(|| format!("Stellbefehl für '{}' nicht gesendet", turnout.name))?;
    ctx.registry.set_pending(index, true);
    log::info!("Stellbefehl '{}' -> {:?}", turnout.name, target);
    Ok(())
}

/// Legt eine neue Weiche an, meldet ihre Events am Bus an, fragt sofort
/// den Ist-Zustand ab und speichert die Weichenliste.
pub fn add_turnout(
    ctx: &PanelContext,
    bus: &dyn BusInterface,
    event_normal: EventId,
    event_reverse: EventId,
    name: &str,
) -> Result<usize> {
    let index = ctx
        .registry
        .add(event_normal, event_reverse, name)
        .context("Weiche konnte nicht angelegt werden")?;

    bus.register_turnout_events(event_normal, event_reverse);
    ctx.router.query_turnout_state(bus, event_normal, event_reverse);
    ctx.save_roster()?;
    Ok(index)
}

/// Entfernt die Weiche an `index` samt Panel-Platzierung (Kaskade über
/// referenzierende Gleise) und speichert beide Stores.
pub fn remove_turnout(ctx: &mut PanelContext, index: usize) -> Result<()> {
    let turnout = ctx
        .registry
        .get(index)
        .with_context(|| format!("Keine Weiche an Index {}", index))?;

    ctx.registry
        .remove(index)
        .context("Weiche konnte nicht entfernt werden")?;

    if let Some(item_index) = ctx.layout.find_item(turnout.id) {
        ctx.layout.remove_item(item_index);
        ctx.save_layout()?;
    }
    ctx.save_roster()?;
    Ok(())
}

/// Platziert eine Weiche auf dem Panel. Pro Weiche höchstens ein Item.
pub fn place_turnout(
    ctx: &mut PanelContext,
    turnout_id: u32,
    grid_x: i32,
    grid_y: i32,
) -> Result<usize> {
    if ctx.layout.is_turnout_placed(turnout_id) {
        bail!("Weiche {} ist bereits platziert", turnout_id);
    }
    let index = ctx
        .layout
        .add_item(turnout_id, grid_x, grid_y)
        .context("Panel ist voll")?;
    ctx.save_layout()?;
    Ok(index)
}

/// Zeichnet ein Gleissegment und speichert das Layout.
pub fn add_track(ctx: &mut PanelContext, track: Track) -> Result<usize> {
    let index = ctx
        .layout
        .add_track(track)
        .context("Gleisliste ist voll")?;
    ctx.save_layout()?;
    Ok(index)
}
