// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};

#[test]
fn task_id_compose_format() {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let id = TaskId::compose("nessus", "scanner-01", now);
    let parts: Vec<&str> = id.as_str().split('_').collect();
    assert_eq!(parts[0], "nessus");
    assert_eq!(parts[1], "scanner-01");
    assert_eq!(parts[2], "20260314");
    assert_eq!(parts[3], "092653");
    assert_eq!(parts[4].len(), 6);
    assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn task_ids_are_unique() {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let a = TaskId::compose("nessus", "s1", now);
    let b = TaskId::compose("nessus", "s1", now);
    assert_ne!(a, b);
}

#[test]
fn trace_id_generates_uuid() {
    let id = TraceId::generate();
    assert_eq!(id.as_str().len(), 36);
}

#[test]
fn short_truncates() {
    assert_eq!("abcdef".short(3), "abc");
    assert_eq!("ab".short(3), "ab");
}

#[test]
fn sequential_id_gen_counts_up() {
    let id_gen = SequentialIdGen::new("t");
    assert_eq!(id_gen.next(), "t-1");
    assert_eq!(id_gen.next(), "t-2");
}

#[test]
fn uuid_id_gen_unique() {
    let id_gen = UuidIdGen;
    assert_ne!(id_gen.next(), id_gen.next());
}
