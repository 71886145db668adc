//! Migration Rollback - Handles rolling back applied migrations
//!
//! Runs `down` transforms from the current version towards a target,
//! newest first. Each successful step records `version - 1` with a
//! "Rollback from ..." history entry; forward entries are left in place.

use crate::definitions::{Direction, RunOutcome};
use crate::error::MigrationError;
use crate::migrator::Migrator;

impl Migrator {
    /// Roll back to `target`, or to the previous version when `None`.
    ///
    /// A negative target is rejected before anything is touched. A target
    /// at or above the current version is a successful no-op.
    pub async fn rollback(&self, target: Option<i64>) -> RunOutcome {
        tracing::info!("Starting rollback...");

        let current = self.current_version().await;
        tracing::info!("Current database version: {}", current);

        let outcome = RunOutcome::start(Direction::Down, current);
        let target = target.unwrap_or(i64::from(current) - 1);

        if target < 0 {
            let error = MigrationError::NegativeTarget { target };
            tracing::error!("{}", error);
            return outcome.failed(error);
        }

        if target >= i64::from(current) {
            tracing::info!(
                "Target version {} is not a rollback from current version {}",
                target,
                current
            );
            return outcome;
        }

        // 0 <= target < current <= u32::MAX
        let target = target as u32;
        self.rollback_to(target, current, outcome).await
    }

    async fn rollback_to(&self, target: u32, current: u32, mut outcome: RunOutcome) -> RunOutcome {
        let plan = self.registry().rollback_plan(target, current);
        tracing::info!(
            "Rolling back {} migrations to version {}",
            plan.len(),
            target
        );

        if plan.is_empty() {
            tracing::info!("No migrations to roll back");
            return outcome;
        }

        let ctx = self.context();

        for migration in plan {
            tracing::info!(
                "Rolling back migration {}: {}",
                migration.version,
                migration.name
            );

            let Some(down) = migration.down() else {
                let error = MigrationError::MissingDown {
                    version: migration.version,
                };
                tracing::error!("{}", error);
                return outcome.failed(error);
            };

            if let Err(e) = down.run(self.db(), &ctx).await {
                let error = MigrationError::transform(
                    migration.version,
                    &migration.name,
                    Direction::Down,
                    e,
                );
                tracing::error!("{}", error);
                return outcome.failed(error);
            }

            let recorded = migration.version - 1;
            if let Err(error) = self
                .versions()
                .record(
                    recorded,
                    &format!("Rollback from {}", migration.name),
                    &format!("Rolled back from version {}", migration.version),
                )
                .await
            {
                tracing::error!(
                    "Error rolling back migration {}: {}",
                    migration.version,
                    error
                );
                return outcome.failed(error);
            }

            outcome.reached = recorded;
            outcome.steps.push(migration.version);
            tracing::info!("Successfully rolled back migration {}", migration.version);
        }

        tracing::info!("Successfully rolled back to version {}", target);
        outcome
    }
}
