// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Rows of the trace store and the queries reporting tools read them with.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Row};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::errors::TraceError;
use crate::ids::{ComponentId, ConnectionId};
use crate::record::Serial;
use crate::trace::db::{TraceDb, TraceRows};
use crate::traits::PortDirection;

/// Lifecycle state of a component, and of the run as a whole.
///
/// `Finished` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Init,
    Running,
    Finished,
    Error,
}

impl ComponentState {
    pub fn code(self) -> &'static str {
        match self {
            ComponentState::Init => "init",
            ComponentState::Running => "running",
            ComponentState::Finished => "finished",
            ComponentState::Error => "error",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "init" => Some(ComponentState::Init),
            "running" => Some(ComponentState::Running),
            "finished" => Some(ComponentState::Finished),
            "error" => Some(ComponentState::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ComponentState::Finished | ComponentState::Error)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ToSql for ComponentState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ComponentState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        ComponentState::from_code(code)
            .ok_or_else(|| FromSqlError::Other(format!("unknown state code '{code}'").into()))
    }
}

impl ToSql for PortDirection {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for PortDirection {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        PortDirection::from_code(code)
            .ok_or_else(|| FromSqlError::Other(format!("unknown port type '{code}'").into()))
    }
}

// Fixed-width UTC RFC3339, so text order in the store is time order.
const STORED_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z");

pub(crate) fn timestamp(value: OffsetDateTime) -> Result<String, TraceError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(STORED_TIMESTAMP)
        .map_err(|e| TraceError::InvalidTimestamp(e.to_string()))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let text: String = row.get(idx)?;
    OffsetDateTime::parse(&text, &Rfc3339)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        OffsetDateTime::parse(&t, &Rfc3339)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
    })
    .transpose()
}

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e)))
}

/// A component of the traced run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentTrace {
    pub id: ComponentId,
    pub name: String,
    pub class_name: String,
    pub state: ComponentState,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

impl ComponentTrace {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: ComponentId(id_column(row, 0)?),
            name: row.get(1)?,
            class_name: row.get(2)?,
            state: row.get(3)?,
            started_at: parse_timestamp(row, 4)?,
            ended_at: parse_optional_timestamp(row, 5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortTrace {
    pub component_id: ComponentId,
    pub name: String,
    pub direction: PortDirection,
    pub schema: String,
}

/// One edge of the wiring graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTrace {
    pub id: ConnectionId,
    pub source_component_id: ComponentId,
    pub source_port: String,
    pub dest_component_id: ComponentId,
    pub dest_port: String,
}

/// One record's transit across one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeTrace {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub record_serial: Serial,
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTrace {
    pub serial: Serial,
    pub record_type: String,
}

/// Envelope totals for one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub connection_id: ConnectionId,
    pub envelope_count: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_envelope_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_envelope_at: Option<OffsetDateTime>,
}

// -- Queries -----------------------------------------------------------------

impl TraceDb {
    pub fn list_components(&self) -> Result<TraceRows<ComponentTrace>, TraceError> {
        self.execute_select(
            "SELECT id, name, class, state_code, started_at, ended_at
             FROM components ORDER BY id",
            [],
            ComponentTrace::from_row,
        )
    }

    pub fn get_component(&self, id: ComponentId) -> Result<ComponentTrace, TraceError> {
        self.execute_select_one(
            "SELECT id, name, class, state_code, started_at, ended_at
             FROM components WHERE id = ?1",
            params![id.0 as i64],
            ComponentTrace::from_row,
        )
    }

    /// Ports of one component, optionally only one direction.
    pub fn list_ports_for(
        &self,
        component_id: ComponentId,
        port_type: Option<PortDirection>,
    ) -> Result<TraceRows<PortTrace>, TraceError> {
        let map = |row: &Row<'_>| -> rusqlite::Result<PortTrace> {
            Ok(PortTrace {
                component_id: ComponentId(id_column(row, 0)?),
                name: row.get(1)?,
                direction: row.get(2)?,
                schema: row.get(3)?,
            })
        };
        match port_type {
            Some(direction) => self.execute_select(
                "SELECT component_id, name, port_type, schema FROM ports
                 WHERE component_id = ?1 AND port_type = ?2 ORDER BY rowid",
                params![component_id.0 as i64, direction],
                map,
            ),
            None => self.execute_select(
                "SELECT component_id, name, port_type, schema FROM ports
                 WHERE component_id = ?1 ORDER BY rowid",
                params![component_id.0 as i64],
                map,
            ),
        }
    }

    pub fn list_connections(&self) -> Result<TraceRows<ConnectionTrace>, TraceError> {
        self.execute_select(
            "SELECT id, src_comp_id, src_port, dst_comp_id, dst_port
             FROM connections ORDER BY id",
            [],
            |row| {
                Ok(ConnectionTrace {
                    id: ConnectionId(id_column(row, 0)?),
                    source_component_id: ComponentId(id_column(row, 1)?),
                    source_port: row.get(2)?,
                    dest_component_id: ComponentId(id_column(row, 3)?),
                    dest_port: row.get(4)?,
                })
            },
        )
    }

    /// Envelope count and first/last transit time per connection, including
    /// connections nothing travelled over.
    pub fn get_connection_stats(&self) -> Result<TraceRows<ConnectionStats>, TraceError> {
        self.execute_select(
            "SELECT c.id, count(e.seq), min(e.ts), max(e.ts)
             FROM connections c
             LEFT JOIN envelopes e ON e.connection_id = c.id
             GROUP BY c.id
             ORDER BY c.id",
            [],
            |row| {
                let count: i64 = row.get(1)?;
                Ok(ConnectionStats {
                    connection_id: ConnectionId(id_column(row, 0)?),
                    envelope_count: u64::try_from(count).unwrap_or(0),
                    first_envelope_at: parse_optional_timestamp(row, 2)?,
                    last_envelope_at: parse_optional_timestamp(row, 3)?,
                })
            },
        )
    }

    /// Every envelope, in the order the tracer applied them.
    pub fn list_envelopes(&self) -> Result<TraceRows<EnvelopeTrace>, TraceError> {
        self.execute_select(
            "SELECT ts, record_serial, connection_id FROM envelopes ORDER BY seq",
            [],
            |row| {
                Ok(EnvelopeTrace {
                    ts: parse_timestamp(row, 0)?,
                    record_serial: Serial(id_column(row, 1)?),
                    connection_id: ConnectionId(id_column(row, 2)?),
                })
            },
        )
    }

    pub fn list_records(&self) -> Result<TraceRows<RecordTrace>, TraceError> {
        self.execute_select(
            "SELECT serial, record_type FROM records ORDER BY serial",
            [],
            |row| {
                Ok(RecordTrace {
                    serial: Serial(id_column(row, 0)?),
                    record_type: row.get(1)?,
                })
            },
        )
    }
}
