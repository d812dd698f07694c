// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Trace store DDL.

/// Version string written to the `etl` table at bootstrap.
pub const TRACE_SCHEMA_VERSION: &str = "1";

pub(crate) const CREATE_STATEMENTS: &[&str] = &[
    r"
CREATE TABLE etl (
  state_code  TEXT NOT NULL,
  db_ver      TEXT NOT NULL
);",
    r"
CREATE TABLE components (
  id          INTEGER PRIMARY KEY,
  name        TEXT NOT NULL,
  class       TEXT NOT NULL,
  state_code  TEXT NOT NULL,
  started_at  TEXT NOT NULL,
  ended_at    TEXT
);",
    r"
CREATE TABLE ports (
  component_id  INTEGER NOT NULL,
  name          TEXT NOT NULL,
  port_type     TEXT NOT NULL CHECK (port_type IN ('i','o')),
  schema        TEXT NOT NULL,
  PRIMARY KEY (component_id, port_type, name)
);",
    r"
CREATE TABLE connections (
  id             INTEGER PRIMARY KEY,
  src_comp_id    INTEGER NOT NULL,
  src_port       TEXT NOT NULL,
  dst_comp_id    INTEGER NOT NULL,
  dst_port       TEXT NOT NULL
);",
    r"
CREATE TABLE envelopes (
  seq            INTEGER PRIMARY KEY AUTOINCREMENT,
  ts             TEXT NOT NULL,
  record_serial  INTEGER NOT NULL,
  connection_id  INTEGER NOT NULL
);",
    r"
CREATE TABLE records (
  serial       INTEGER PRIMARY KEY,
  record_type  TEXT NOT NULL
);",
    "CREATE INDEX idx_envelopes_connection ON envelopes(connection_id);",
];
