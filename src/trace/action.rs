// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Trace actions: one timestamped event, written by the tracer thread.

use rusqlite::params;
use time::OffsetDateTime;

use crate::errors::TraceError;
use crate::ids::{ComponentId, ConnectionId};
use crate::record::Serial;
use crate::trace::db::TraceDb;
use crate::trace::entities::{timestamp, ComponentState};
use crate::traits::PortDirection;

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    RunStateChange {
        state: ComponentState,
    },
    NewComponent {
        id: ComponentId,
        name: String,
        class_name: String,
        state: ComponentState,
    },
    ComponentStateChange {
        id: ComponentId,
        state: ComponentState,
    },
    NewPort {
        component_id: ComponentId,
        name: String,
        direction: PortDirection,
        schema: String,
    },
    NewConnection {
        id: ConnectionId,
        source_component: ComponentId,
        source_port: String,
        dest_component: ComponentId,
        dest_port: String,
    },
    NewRecord {
        serial: Serial,
        record_type: String,
    },
    NewEnvelope {
        serial: Serial,
        connection_id: ConnectionId,
    },
}

/// An event plus the moment it was submitted.
///
/// The timestamp is taken on the submitting unit, not when the tracer gets
/// around to writing it.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceAction {
    pub at: OffsetDateTime,
    pub event: TraceEvent,
}

impl TraceAction {
    pub fn new(event: TraceEvent) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            event,
        }
    }

    /// Short name for log lines.
    pub fn label(&self) -> &'static str {
        match self.event {
            TraceEvent::RunStateChange { .. } => "run_state_change",
            TraceEvent::NewComponent { .. } => "new_component",
            TraceEvent::ComponentStateChange { .. } => "component_state_change",
            TraceEvent::NewPort { .. } => "new_port",
            TraceEvent::NewConnection { .. } => "new_connection",
            TraceEvent::NewRecord { .. } => "new_record",
            TraceEvent::NewEnvelope { .. } => "new_envelope",
        }
    }

    /// Lifecycle and wiring writes are committed at once; high volume writes
    /// ride along with the next commit.
    pub fn commits_immediately(&self) -> bool {
        !matches!(
            self.event,
            TraceEvent::NewPort { .. } | TraceEvent::NewRecord { .. } | TraceEvent::NewEnvelope { .. }
        )
    }

    /// Apply the action to the store.
    pub fn record_to_db(&self, db: &TraceDb) -> Result<(), TraceError> {
        let commit = self.commits_immediately();
        match &self.event {
            TraceEvent::RunStateChange { state } => db.set_etl_state(*state),
            TraceEvent::NewComponent {
                id,
                name,
                class_name,
                state,
            } => {
                db.execute_update(
                    "INSERT INTO components (id, name, class, state_code, started_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id.0 as i64, name, class_name, state, timestamp(self.at)?],
                    commit,
                )?;
                Ok(())
            }
            TraceEvent::ComponentStateChange { id, state } => {
                if state.is_terminal() {
                    db.execute_update(
                        "UPDATE components SET state_code = ?1, ended_at = coalesce(ended_at, ?2)
                         WHERE id = ?3",
                        params![state, timestamp(self.at)?, id.0 as i64],
                        commit,
                    )?;
                } else {
                    db.execute_update(
                        "UPDATE components SET state_code = ?1 WHERE id = ?2",
                        params![state, id.0 as i64],
                        commit,
                    )?;
                }
                Ok(())
            }
            TraceEvent::NewPort {
                component_id,
                name,
                direction,
                schema,
            } => {
                db.execute_update(
                    "INSERT INTO ports (component_id, name, port_type, schema) VALUES (?1, ?2, ?3, ?4)",
                    params![component_id.0 as i64, name, direction, schema],
                    commit,
                )?;
                Ok(())
            }
            TraceEvent::NewConnection {
                id,
                source_component,
                source_port,
                dest_component,
                dest_port,
            } => {
                db.execute_update(
                    "INSERT INTO connections (id, src_comp_id, src_port, dst_comp_id, dst_port)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id.0 as i64,
                        source_component.0 as i64,
                        source_port,
                        dest_component.0 as i64,
                        dest_port
                    ],
                    commit,
                )?;
                Ok(())
            }
            TraceEvent::NewRecord {
                serial,
                record_type,
            } => {
                db.execute_update(
                    "INSERT INTO records (serial, record_type) VALUES (?1, ?2)",
                    params![serial.0 as i64, record_type],
                    commit,
                )?;
                Ok(())
            }
            TraceEvent::NewEnvelope {
                serial,
                connection_id,
            } => {
                db.execute_update(
                    "INSERT INTO envelopes (ts, record_serial, connection_id) VALUES (?1, ?2, ?3)",
                    params![timestamp(self.at)?, serial.0 as i64, connection_id.0 as i64],
                    commit,
                )?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::db::TraceMode;

    fn store() -> (tempfile::TempDir, TraceDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = TraceDb::create(dir.path().join("actions.trace")).unwrap();
        (dir, db)
    }

    fn new_component(id: u64, name: &str) -> TraceAction {
        TraceAction::new(TraceEvent::NewComponent {
            id: ComponentId(id),
            name: name.to_string(),
            class_name: "Widget".to_string(),
            state: ComponentState::Init,
        })
    }

    #[test]
    fn test_component_lifecycle_sets_ended_at_once() {
        let (_dir, db) = store();
        new_component(1, "source").record_to_db(&db).unwrap();

        let running = TraceAction::new(TraceEvent::ComponentStateChange {
            id: ComponentId(1),
            state: ComponentState::Running,
        });
        running.record_to_db(&db).unwrap();
        assert_eq!(db.get_component(ComponentId(1)).unwrap().ended_at, None);

        let finished = TraceAction::new(TraceEvent::ComponentStateChange {
            id: ComponentId(1),
            state: ComponentState::Finished,
        });
        finished.record_to_db(&db).unwrap();

        let row = db.get_component(ComponentId(1)).unwrap();
        assert_eq!(row.state, ComponentState::Finished);
        assert_eq!(row.class_name, "Widget");
        let ended = row.ended_at.unwrap();
        assert!(ended >= row.started_at);

        // a second terminal change keeps the first end time
        let mut again = TraceAction::new(TraceEvent::ComponentStateChange {
            id: ComponentId(1),
            state: ComponentState::Error,
        });
        again.at = ended + time::Duration::seconds(60);
        again.record_to_db(&db).unwrap();
        assert_eq!(db.get_component(ComponentId(1)).unwrap().ended_at, Some(ended));
    }

    #[test]
    fn test_ports_are_deferred_and_filterable_by_direction() {
        let (dir, db) = store();
        new_component(1, "mapper").record_to_db(&db).unwrap();
        for (name, direction) in [("rows", PortDirection::Input), ("out", PortDirection::Output)] {
            let port = TraceAction::new(TraceEvent::NewPort {
                component_id: ComponentId(1),
                name: name.to_string(),
                direction,
                schema: "row".to_string(),
            });
            assert!(!port.commits_immediately());
            port.record_to_db(&db).unwrap();
        }

        let reader = TraceDb::open(dir.path().join("actions.trace"), TraceMode::ReadOnly).unwrap();
        assert_eq!(reader.list_ports_for(ComponentId(1), None).unwrap().len(), 0);

        db.commit().unwrap();
        let inputs: Vec<_> = reader
            .list_ports_for(ComponentId(1), Some(PortDirection::Input))
            .unwrap()
            .collect();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "rows");
        assert_eq!(reader.list_ports_for(ComponentId(1), None).unwrap().len(), 2);
    }

    #[test]
    fn test_connection_stats_include_idle_connections() {
        let (_dir, db) = store();
        for id in 1..=2 {
            TraceAction::new(TraceEvent::NewConnection {
                id: ConnectionId(id),
                source_component: ComponentId(1),
                source_port: "out".to_string(),
                dest_component: ComponentId(2),
                dest_port: format!("in{id}"),
            })
            .record_to_db(&db)
            .unwrap();
        }
        for serial in 1..=3 {
            TraceAction::new(TraceEvent::NewEnvelope {
                serial: Serial(serial),
                connection_id: ConnectionId(1),
            })
            .record_to_db(&db)
            .unwrap();
        }
        db.commit().unwrap();

        let stats: Vec<_> = db.get_connection_stats().unwrap().collect();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].envelope_count, 3);
        assert!(stats[0].first_envelope_at <= stats[0].last_envelope_at);
        assert_eq!(stats[1].envelope_count, 0);
        assert_eq!(stats[1].first_envelope_at, None);
    }

    #[test]
    fn test_run_state_change_updates_etl_row() {
        let (_dir, db) = store();
        TraceAction::new(TraceEvent::RunStateChange {
            state: ComponentState::Running,
        })
        .record_to_db(&db)
        .unwrap();
        assert_eq!(db.etl_state().unwrap(), ComponentState::Running);
    }
}
