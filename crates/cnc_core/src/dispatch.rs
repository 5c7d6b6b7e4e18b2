//! Event execution.
//!
//! Executing an event reads and writes replicated state only, so every
//! peer that executes the same events on the same frames stays in sync.
//! Orders that refer to objects the sender does not own, or to objects
//! that have died since the order was issued, are silently dropped.

use crate::event::{Event, EventKind};
use crate::house::HouseId;
use crate::math::FacingType;
use crate::mission::Mission;
use crate::target::Target;
use crate::unit::UnitId;
use crate::world::{AnimationRequest, ChatMessage, World};

impl Event {
    /// Carry out the event against `world` and mark it executed.
    pub fn execute(&mut self, world: &mut World) {
        let player = self.player;
        tracing::debug!(
            frame = world.frame(),
            player,
            kind = self.event_type().name(),
            "Executing event"
        );

        match &self.kind {
            EventKind::Empty | EventKind::Options => {}
            EventKind::Ally { house } => {
                let house = *house;
                if let Some(sender) = world.house_mut(player) {
                    if sender.is_ally(house) {
                        sender.make_enemy(house);
                    } else {
                        sender.make_ally(house);
                    }
                }
            }
            EventKind::MegaMission {
                whom,
                mission,
                target,
                destination,
            } => {
                mega_mission(world, player, *whom, *mission, *target, *destination, None);
            }
            EventKind::MegaMissionF {
                whom,
                mission,
                target,
                destination,
                speed,
                max_speed,
            } => {
                mega_mission(
                    world,
                    player,
                    *whom,
                    *mission,
                    *target,
                    *destination,
                    Some((*speed, *max_speed)),
                );
            }
            EventKind::Idle { whom } => {
                if let Some(id) = owned_unit(world, player, *whom) {
                    world.idle_unit(id);
                }
            }
            EventKind::Scatter { whom } => {
                if let Some(id) = owned_unit(world, player, *whom) {
                    scatter(world, id);
                }
            }
            EventKind::Destruct => {
                if let Some(house) = world.house_mut(player) {
                    house.to_die = true;
                }
            }
            EventKind::Deploy { whom } => {
                if let Some(unit) = owned_unit(world, player, *whom).and_then(|id| world.units.get_mut(&id)) {
                    unit.drive.is_turret_locked_down = true;
                    unit.assign_mission(Mission::Unload);
                }
            }
            EventKind::Place { kind, cell } => {
                world.place_completed(player, *kind, *cell);
            }
            EventKind::Produce { kind, type_id } => {
                let (kind, type_id) = (*kind, *type_id);
                if let Some(house) = world.houses.iter_mut().find(|h| h.id == player) {
                    house.begin_production(kind, type_id, &world.rules);
                }
            }
            EventKind::Suspend { kind } => {
                if let Some(house) = world.house_mut(player) {
                    house.suspend_production(*kind);
                }
            }
            EventKind::Abandon { kind } => {
                if let Some(house) = world.house_mut(player) {
                    house.abandon_production(*kind);
                }
            }
            EventKind::Primary { whom } => {
                if let Some(id) = whom.as_building() {
                    world.set_primary(player, id);
                }
            }
            EventKind::SpecialPlace { special, cell } => {
                world.fire_special(player, *special, *cell);
            }
            EventKind::Exit => {
                if world.local_player() == Some(player) {
                    world.game_active = false;
                } else if let Some(house) = world.house_mut(player) {
                    house.is_human = false;
                    tracing::info!(player, "Player left; house handed to the computer");
                }
            }
            EventKind::GameSpeed { speed } => {
                world.options.game_speed = *speed;
            }
            EventKind::Animation { anim, owner, coord } => {
                world.request_animation(AnimationRequest {
                    anim: *anim,
                    owner: *owner,
                    coord: *coord,
                });
            }
            EventKind::Repair { whom } => {
                if let Some(building) = whom
                    .as_building()
                    .and_then(|id| world.buildings.get_mut(&id))
                    .filter(|b| b.owner == player && b.is_alive())
                {
                    building.is_repairing = !building.is_repairing;
                }
            }
            EventKind::Sell { whom } => {
                if let Some(id) = whom.as_building() {
                    world.sell_building(player, id);
                }
            }
            EventKind::SellCell { cell } => {
                world.sell_wall(player, *cell);
            }
            EventKind::Special { flags } => {
                world.options.special = *flags;
                tracing::info!(flags = flags.bits(), "Special options changed");
            }
            EventKind::FrameSync {
                crc,
                command_count,
                delay,
            }
            | EventKind::FrameInfo {
                crc,
                command_count,
                delay,
            } => {
                tracing::trace!(player, command_count, "Frame checksum received");
                world.record_remote_crc(self.frame, player, *crc, *delay);
            }
            EventKind::Message { text } => {
                world.messages.push(ChatMessage {
                    frame: self.frame,
                    player,
                    text: text.clone(),
                });
            }
            EventKind::ResponseTime { max_ahead } => {
                world.pacing.max_ahead = *max_ahead;
            }
            EventKind::SaveGame => {
                world.save_requested = true;
            }
            EventKind::Archive { whom, target } => {
                let target = *target;
                if let Some(unit) = owned_unit(world, player, *whom).and_then(|id| world.units.get_mut(&id)) {
                    unit.archive = target;
                }
            }
            EventKind::AddPlayer { data } => {
                tracing::info!(player, bytes = data.len(), "Player join record received");
            }
            EventKind::Timing {
                desired_frame_rate,
                max_ahead,
            } => {
                let frame = world.frame();
                world.pacing.apply_max_ahead(frame, u32::from(*max_ahead));
                world.pacing.desired_frame_rate = *desired_frame_rate;
            }
            EventKind::ProcessTime { average_ticks } => {
                if let Some(house) = world.house_mut(player) {
                    house.process_time = *average_ticks;
                }
            }
            EventKind::ProposeDraw => {
                if let Some(house) = world.house_mut(player) {
                    house.proposes_draw = true;
                }
            }
            EventKind::RetractDraw => {
                if let Some(house) = world.house_mut(player) {
                    house.proposes_draw = false;
                }
            }
        }

        self.is_executed = true;
    }
}

/// Unit named by `whom` if it exists, is alive, and belongs to `player`.
fn owned_unit(world: &World, player: HouseId, whom: Target) -> Option<UnitId> {
    let id = whom.as_unit()?;
    world
        .units
        .get(&id)
        .filter(|u| u.owner == player && u.is_alive())
        .map(|u| u.id)
}

fn mega_mission(
    world: &mut World,
    player: HouseId,
    whom: Target,
    mission: Mission,
    target: Target,
    destination: Target,
    formation: Option<(u8, u8)>,
) {
    let Some(id) = owned_unit(world, player, whom) else {
        return;
    };
    if (target.is_some() && !world.is_target_legal(target))
        || (destination.is_some() && !world.is_target_legal(destination))
    {
        return;
    }
    world.leave_team(id);

    let Some(unit) = world.units.get_mut(&id) else {
        return;
    };
    match formation {
        Some((speed, max_speed)) => {
            unit.is_formation_move = true;
            unit.formation_speed =
                crate::data::SpeedClass::from_u8(speed).unwrap_or(unit.formation_speed);
            unit.formation_max_speed = max_speed;
        }
        None => unit.clear_formation(),
    }
    unit.assign_mission(mission);
    match mission {
        Mission::GuardArea => {
            unit.assign_target(Target::None);
            unit.assign_destination(target);
            unit.archive = target;
        }
        Mission::QMove => {
            unit.nav_queue.push(destination);
        }
        _ => {
            unit.nav_queue.clear();
            unit.assign_target(target);
            unit.assign_destination(destination);
        }
    }
}

/// Send a unit to a random open neighbouring cell.
fn scatter(world: &mut World, id: UnitId) {
    let Some(unit) = world.units.get(&id) else {
        return;
    };
    let cell = unit.cell();
    let speed = unit.speed_class(&world.rules);
    let first = FacingType::from_index(world.random.range(0, 7) as u8);
    let open = world.map.open_neighbours(cell, first, id, speed, &world.rules);
    let Some(&dest) = open.first() else {
        return;
    };
    if let Some(unit) = world.units.get_mut(&id) {
        if !unit.drive.is_driving {
            unit.assign_mission(Mission::Move);
            unit.assign_destination(Target::Cell(dest));
        }
    }
}
