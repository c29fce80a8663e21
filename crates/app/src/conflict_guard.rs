//! Device conflict guard: one command per physical device per tick.
//!
//! Adjacent bays can share a device (one bay's drain gate is the next bay's
//! supply gate), and a misconfigured farm can even wire the same device into
//! two paddocks. The guard runs once over the whole farm after every paddock
//! has been coordinated and makes sure each device receives a single command.

use std::collections::BTreeMap;

use serde::Serialize;

use pwm_domain::id::{BayId, DeviceId, PaddockId};
use pwm_domain::report::Report;
use pwm_domain::slot::{DeviceCommand, DeviceSlot};

/// A command a bay would like to send through one of its slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedCommand {
    pub paddock: PaddockId,
    pub bay: BayId,
    pub order: u32,
    pub slot: DeviceSlot,
    pub device: DeviceId,
    pub command: DeviceCommand,
    /// The bay runs an automation mode other than `Off`.
    pub active: bool,
}

impl ProposedCommand {
    fn priority(&self) -> (bool, &PaddockId, u32, &BayId, DeviceSlot) {
        (!self.active, &self.paddock, self.order, &self.bay, self.slot)
    }
}

/// A command that survived reconciliation, attributed to the winning claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedCommand {
    pub device: DeviceId,
    pub command: DeviceCommand,
    pub bay: BayId,
    pub slot: DeviceSlot,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    /// One command per device, sorted by device id.
    pub commands: Vec<EmittedCommand>,
    pub reports: Vec<Report>,
}

/// Reduce the proposed commands to one per device.
///
/// Claims from active bays outrank claims from bays that are `Off`; within
/// each group claims are ranked by paddock id, bay order, bay id and slot.
/// The first claim wins. Later claims asking for the same command are merged
/// into it; later claims asking for something else lose and are reported.
#[must_use]
pub fn reconcile(proposals: Vec<ProposedCommand>) -> Reconciled {
    let mut by_device: BTreeMap<DeviceId, Vec<ProposedCommand>> = BTreeMap::new();
    for proposal in proposals {
        by_device
            .entry(proposal.device.clone())
            .or_default()
            .push(proposal);
    }

    let mut reconciled = Reconciled::default();
    for (device, mut claims) in by_device {
        claims.sort_by(|a, b| a.priority().cmp(&b.priority()));
        let mut claims = claims.into_iter();
        let Some(winner) = claims.next() else {
            continue;
        };

        for claim in claims {
            if claim.command == winner.command {
                tracing::trace!(%device, bay = %claim.bay, "claim merged");
                continue;
            }
            tracing::warn!(
                %device,
                winner = %winner.bay,
                loser = %claim.bay,
                granted = %winner.command,
                requested = %claim.command,
                "device conflict"
            );
            reconciled.reports.push(Report::DeviceConflict {
                device: device.clone(),
                winner: winner.bay.clone(),
                winner_slot: winner.slot,
                granted: winner.command,
                loser: claim.bay,
                loser_slot: claim.slot,
                requested: claim.command,
            });
        }

        reconciled.commands.push(EmittedCommand {
            device,
            command: winner.command,
            bay: winner.bay,
            slot: winner.slot,
        });
    }
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(
        paddock: &str,
        order: u32,
        slot: DeviceSlot,
        device: &str,
        command: DeviceCommand,
    ) -> ProposedCommand {
        let paddock = PaddockId::new(paddock);
        ProposedCommand {
            bay: BayId::for_order(&paddock, order),
            paddock,
            order,
            slot,
            device: DeviceId::new(device),
            command,
            active: true,
        }
    }

    fn idle(paddock: &str, order: u32, slot: DeviceSlot, device: &str) -> ProposedCommand {
        ProposedCommand {
            active: false,
            ..claim(paddock, order, slot, device, DeviceCommand::Close)
        }
    }

    #[test]
    fn should_pass_through_commands_without_overlap() {
        let result = reconcile(vec![
            claim("x", 2, DeviceSlot::Supply1, "rb_002", DeviceCommand::Close),
            claim("x", 1, DeviceSlot::Supply1, "rb_001", DeviceCommand::Open),
        ]);

        let devices: Vec<&str> = result.commands.iter().map(|c| c.device.as_str()).collect();
        assert_eq!(devices, vec!["rb_001", "rb_002"]);
        assert!(result.reports.is_empty());
    }

    #[test]
    fn should_merge_claims_asking_for_same_command() {
        let result = reconcile(vec![
            claim("x", 2, DeviceSlot::Supply1, "rb_010", DeviceCommand::Close),
            claim("x", 1, DeviceSlot::Drain1, "rb_010", DeviceCommand::Close),
        ]);

        assert_eq!(
            result.commands,
            vec![EmittedCommand {
                device: DeviceId::new("rb_010"),
                command: DeviceCommand::Close,
                bay: BayId::new("x_b_01"),
                slot: DeviceSlot::Drain1,
            }]
        );
        assert!(result.reports.is_empty());
    }

    #[test]
    fn should_let_first_paddock_win_shared_device() {
        let result = reconcile(vec![
            claim("y", 1, DeviceSlot::Supply1, "rb_040", DeviceCommand::Close),
            claim("x", 1, DeviceSlot::Supply1, "rb_040", DeviceCommand::Open),
        ]);

        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].command, DeviceCommand::Open);
        assert_eq!(result.commands[0].bay, BayId::new("x_b_01"));
        assert_eq!(
            result.reports,
            vec![Report::DeviceConflict {
                device: DeviceId::new("rb_040"),
                winner: BayId::new("x_b_01"),
                winner_slot: DeviceSlot::Supply1,
                granted: DeviceCommand::Open,
                loser: BayId::new("y_b_01"),
                loser_slot: DeviceSlot::Supply1,
                requested: DeviceCommand::Close,
            }]
        );
    }

    #[test]
    fn should_let_active_bay_win_over_idle_paddock_with_lower_id() {
        let result = reconcile(vec![
            idle("a", 1, DeviceSlot::Supply1, "channel_1"),
            claim("b", 1, DeviceSlot::Supply1, "channel_1", DeviceCommand::Open),
        ]);

        assert_eq!(
            result.commands,
            vec![EmittedCommand {
                device: DeviceId::new("channel_1"),
                command: DeviceCommand::Open,
                bay: BayId::new("b_b_01"),
                slot: DeviceSlot::Supply1,
            }]
        );
        assert_eq!(result.reports.len(), 1);
    }

    #[test]
    fn should_keep_idle_close_when_no_active_bay_claims_device() {
        let result = reconcile(vec![
            idle("b", 1, DeviceSlot::Supply1, "channel_1"),
            idle("a", 1, DeviceSlot::Drain1, "channel_1"),
        ]);

        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].command, DeviceCommand::Close);
        assert_eq!(result.commands[0].bay, BayId::new("a_b_01"));
        assert!(result.reports.is_empty());
    }

    #[test]
    fn should_rank_by_order_within_a_paddock() {
        let result = reconcile(vec![
            claim("x", 3, DeviceSlot::Supply1, "rb_020", DeviceCommand::Open),
            claim("x", 2, DeviceSlot::Supply2, "rb_020", DeviceCommand::Close),
        ]);

        assert_eq!(result.commands[0].command, DeviceCommand::Close);
        assert_eq!(result.reports.len(), 1);
    }

    #[test]
    fn should_not_depend_on_proposal_order() {
        let claims = vec![
            claim("y", 1, DeviceSlot::Supply1, "rb_040", DeviceCommand::Close),
            claim("x", 2, DeviceSlot::Supply1, "rb_041", DeviceCommand::Open),
            claim("x", 1, DeviceSlot::Supply1, "rb_040", DeviceCommand::Open),
        ];
        let mut reversed = claims.clone();
        reversed.reverse();

        assert_eq!(reconcile(claims), reconcile(reversed));
    }
}
