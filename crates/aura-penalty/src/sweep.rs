use std::sync::Arc;
use std::time::Instant;

use aura_core::keys::{item_id_from_key, items_prefix, username_from_player_key, PLAYER_PREFIX};
use aura_core::types::{EntityKind, Player, TrackedItem};
use aura_store::{HistoryKind, HistoryLog, KvStore, NewHistoryEntry, StoreError};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, PenaltyWeights, Verdict};
use crate::error::SweepError;
use crate::report::{OverdueItem, PlayerPenalty, SweepIssueKind, SweepReport};

/// Scans every player, sums the weights of their overdue items and lowers
/// their aura by that amount, clamped at zero.
///
/// A run has two phases. The first only reads and classifies, so a store
/// outage there aborts with nothing written. The second re-reads each
/// penalized player immediately before writing so the deduction applies to
/// the current aura, not the one seen during assessment.
pub struct PenaltySweep {
    store: Arc<dyn KvStore>,
    history: Option<Arc<dyn HistoryLog>>,
    weights: PenaltyWeights,
}

/// A player with a non-zero penalty, waiting for phase two.
struct Pending {
    key: String,
    username: String,
    penalty: i64,
    overdue_items: Vec<OverdueItem>,
}

enum Assessment {
    Penalize(Pending),
    Clean,
}

impl PenaltySweep {
    pub fn new(store: Arc<dyn KvStore>, weights: PenaltyWeights) -> Self {
        Self {
            store,
            history: None,
            weights,
        }
    }

    /// Record a history entry after every aura write.
    pub fn with_history(mut self, history: Arc<dyn HistoryLog>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn weights(&self) -> &PenaltyWeights {
        &self.weights
    }

    /// Run one sweep against `today`.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<SweepReport, SweepError> {
        let started = Instant::now();
        let mut report = SweepReport::new(today);

        let players = self.store.list_by_prefix(PLAYER_PREFIX).await.map_err(|e| {
            if e.is_unavailable() {
                SweepError::StoreUnavailable {
                    source: e,
                    players_written: 0,
                }
            } else {
                SweepError::ListPlayers(e)
            }
        })?;

        // Phase one: read and classify only.
        let mut pending = Vec::new();
        for entry in players {
            report.players_scanned += 1;
            let Some(username) = username_from_player_key(&entry.key).map(str::to_string) else {
                warn!(key = %entry.key, "Skipping player key without a valid username");
                report.record_issue(
                    &entry.key,
                    SweepIssueKind::MalformedPlayer,
                    "player key carries no valid username",
                );
                continue;
            };
            if let Err(e) = Player::decode(&entry.key, entry.value) {
                warn!(key = %entry.key, error = %e, "Skipping malformed player");
                report.record_issue(&entry.key, SweepIssueKind::MalformedPlayer, e.to_string());
                continue;
            }

            match self.assess_player(&entry.key, &username, today, &mut report).await {
                Ok(Assessment::Penalize(p)) => pending.push(p),
                Ok(Assessment::Clean) => {}
                Err(e) if e.is_unavailable() => {
                    return Err(SweepError::StoreUnavailable {
                        source: e,
                        players_written: 0,
                    });
                }
                Err(e) => {
                    warn!(username = %username, error = %e, "Failed to read items");
                    report.record_issue(&entry.key, SweepIssueKind::ReadFailed, e.to_string());
                }
            }
        }

        // Phase two: write.
        for p in pending {
            if let Err(e) = self.apply(p, &mut report).await {
                return Err(SweepError::StoreUnavailable {
                    source: e,
                    players_written: report.players_penalized,
                });
            }
        }

        info!(
            today = %today,
            players_scanned = report.players_scanned,
            players_penalized = report.players_penalized,
            total_penalty = report.total_penalty_applied,
            skipped = report.entities_skipped,
            errors = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Penalty sweep complete"
        );
        Ok(report)
    }

    async fn assess_player(
        &self,
        key: &str,
        username: &str,
        today: NaiveDate,
        report: &mut SweepReport,
    ) -> Result<Assessment, StoreError> {
        let mut penalty = 0i64;
        let mut overdue_items = Vec::new();

        for kind in EntityKind::ALL {
            let prefix = items_prefix(kind, username);
            for entry in self.store.list_by_prefix(&prefix).await? {
                if item_id_from_key(&prefix, &entry.key).is_none() {
                    debug!(username, key = %entry.key, "Ignoring key owned by another player");
                    continue;
                }
                let item = match TrackedItem::decode(kind, &entry.key, entry.value) {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(key = %entry.key, error = %e, "Skipping malformed item");
                        report.entities_skipped += 1;
                        continue;
                    }
                };
                match classify(&item, today, &self.weights) {
                    Ok(Verdict::Overdue { penalty: p, due }) => {
                        debug!(username, kind = %kind, id = item.id(), due = %due, penalty = p, "Overdue");
                        penalty += p;
                        overdue_items.push(OverdueItem {
                            kind,
                            id: item.id().to_string(),
                            name: item.name().to_string(),
                            due,
                            penalty: p,
                        });
                    }
                    Ok(Verdict::Current) => {}
                    Err(e) => {
                        warn!(key = %entry.key, error = %e, "Skipping item with invalid recurrence");
                        report.entities_skipped += 1;
                    }
                }
            }
        }

        if penalty == 0 {
            return Ok(Assessment::Clean);
        }
        Ok(Assessment::Penalize(Pending {
            key: key.to_string(),
            username: username.to_string(),
            penalty,
            overdue_items,
        }))
    }

    /// Write one player's new aura. Only `Unavailable` is returned; every
    /// other failure is recorded on the report.
    async fn apply(&self, p: Pending, report: &mut SweepReport) -> Result<(), StoreError> {
        let current = match self.store.get(&p.key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                warn!(username = %p.username, "Player vanished before penalty write");
                report.record_issue(&p.key, SweepIssueKind::PlayerMissing, "player record not found");
                return Ok(());
            }
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                report.record_issue(&p.key, SweepIssueKind::PlayerWriteFailed, e.to_string());
                return Ok(());
            }
        };
        let previous_aura = match Player::decode(&p.key, current) {
            Ok(player) => player.aura,
            Err(e) => {
                report.record_issue(&p.key, SweepIssueKind::MalformedPlayer, e.to_string());
                return Ok(());
            }
        };

        // A stored negative aura would be raised by the clamp; leave it.
        let new_aura = (previous_aura - p.penalty).max(0);
        if new_aura >= previous_aura {
            debug!(username = %p.username, aura = previous_aura, "Aura already at floor");
            return Ok(());
        }

        let mut patch = Map::new();
        patch.insert("aura".into(), json!(new_aura));
        match self.store.merge_update(&p.key, &patch).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                report.record_issue(&p.key, SweepIssueKind::PlayerMissing, "player record not found");
                return Ok(());
            }
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                warn!(username = %p.username, error = %e, "Failed to write aura");
                report.record_issue(&p.key, SweepIssueKind::PlayerWriteFailed, e.to_string());
                return Ok(());
            }
        }

        info!(
            username = %p.username,
            penalty = p.penalty,
            previous_aura,
            new_aura,
            items = p.overdue_items.len(),
            "Aura penalized"
        );
        self.log_history(&p.username, p.penalty, new_aura, &p.overdue_items).await;

        report.record_penalty(PlayerPenalty {
            username: p.username,
            penalty: p.penalty,
            previous_aura,
            new_aura,
            overdue_items: p.overdue_items,
        });
        Ok(())
    }

    async fn log_history(&self, username: &str, penalty: i64, new_aura: i64, items: &[OverdueItem]) {
        let Some(history) = &self.history else {
            return;
        };
        let data: Value = json!({
            "penalty": penalty,
            "aura": new_aura,
            "items": items,
        });
        let entry = NewHistoryEntry {
            user_id: username.to_string(),
            kind: HistoryKind::Player,
            data: Some(data),
            comments: Some(format!(
                "Aura penalized by {penalty} for overdue/incomplete items. New aura: {new_aura}"
            )),
        };
        if let Err(e) = history.append(entry).await {
            warn!(username, error = %e, "Failed to record penalty history");
        }
    }
}
