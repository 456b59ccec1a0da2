//! Property tests for pagination and table ordering.

use proctop::monitor::{
    compute_view, Direction, ProcessRecord, ProcessTable, RawProcess, RecordError, Selection,
    SortKey, SortMode, TableOptions,
};
use proptest::prelude::*;
use std::time::Instant;

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Up),
        Just(Direction::Down),
        Just(Direction::PageUp),
        Just(Direction::PageDown),
        Just(Direction::Home),
        Just(Direction::End),
        Just(Direction::Stay),
    ]
}

fn sort_mode() -> impl Strategy<Value = SortMode> {
    (
        prop_oneof![
            Just(SortKey::Cpu),
            Just(SortKey::Memory),
            Just(SortKey::Pid),
            Just(SortKey::Name),
        ],
        any::<bool>(),
    )
        .prop_map(|(key, descending)| SortMode { key, descending })
}

/// Records with unique pids; some denied, some vanished.
fn records() -> impl Strategy<Value = Vec<ProcessRecord>> {
    prop::collection::btree_map(
        1u32..5000,
        (0.0f32..400.0, 0u64..1 << 34, "[a-zA-Z]{1,8}", 0u8..20),
        0..80,
    )
    .prop_map(|map| {
        map.into_iter()
            .map(|(pid, (cpu, mem, name, kind))| match kind {
                0 => Err(RecordError::AccessDenied {
                    pid,
                    name: Some(name),
                }),
                1 => Err(RecordError::Vanished { pid }),
                _ => Ok(RawProcess::new(pid, name).with_cpu(cpu).with_memory(mem)),
            })
            .collect()
    })
}

fn table(records: Vec<ProcessRecord>, sort: SortMode) -> ProcessTable {
    let mut table = ProcessTable::new(TableOptions::default(), sort);
    table.apply_snapshot(records, 4, Instant::now());
    table
}

proptest! {
    #[test]
    fn prop_visible_slice_length(
        count in 0usize..500,
        page in 0usize..60,
        index in 0usize..600,
        scroll in 0usize..600,
        dir in direction(),
    ) {
        let view = compute_view(count, page, index, scroll, dir);
        prop_assert!(view.visible_start <= view.visible_end);
        prop_assert!(view.visible_end <= count);
        prop_assert_eq!(view.len(), page.min(count - view.visible_start.min(count)));
    }

    #[test]
    fn prop_index_visible_and_in_range(
        count in 1usize..500,
        page in 1usize..60,
        index in 0usize..600,
        scroll in 0usize..600,
        dir in direction(),
    ) {
        let view = compute_view(count, page, index, scroll, dir);
        let i = view.index.unwrap();
        prop_assert!(i < count);
        prop_assert!(view.range().contains(&i));
        prop_assert!(view.visible_start <= count.saturating_sub(page));
    }

    #[test]
    fn prop_empty_list_has_no_index(page in 0usize..60, index in 0usize..100, dir in direction()) {
        prop_assert_eq!(compute_view(0, page, index, 0, dir).index, None);
    }

    #[test]
    fn prop_down_repeatedly_stops_at_last(count in 1usize..300, page in 1usize..40) {
        let mut view = compute_view(count, page, 0, 0, Direction::Stay);
        for _ in 0..count + 5 {
            view = compute_view(count, page, view.index.unwrap(), view.scroll_offset, Direction::Down);
        }
        prop_assert_eq!(view.index, Some(count - 1));
    }

    #[test]
    fn prop_table_order_is_total(records in records(), sort in sort_mode()) {
        let table = table(records, sort);
        for pair in table.entries().windows(2) {
            prop_assert!(sort.compare(&pair[0], &pair[1]).is_lt());
        }
    }

    #[test]
    fn prop_table_pids_unique_and_vanished_omitted(records in records(), sort in sort_mode()) {
        let vanished: Vec<u32> = records
            .iter()
            .filter_map(|r| match r {
                Err(RecordError::Vanished { pid }) => Some(*pid),
                _ => None,
            })
            .collect();
        let expected = records.len() - vanished.len();
        let table = table(records, sort);

        prop_assert_eq!(table.len(), expected);
        for pid in vanished {
            prop_assert!(table.entry(pid).is_none());
        }
        for (i, entry) in table.entries().iter().enumerate() {
            prop_assert_eq!(table.position(entry.pid), Some(i));
        }
    }

    #[test]
    fn prop_selection_never_stale(
        before in records(),
        after in records(),
        page in 1usize..30,
        moves in prop::collection::vec(direction(), 0..20),
    ) {
        let old = table(before, SortMode::default());
        let mut selection = Selection::default();
        for dir in moves {
            selection.navigate(&old, page, dir);
        }

        let new = table(after, SortMode::default());
        selection.reconcile(&new);
        match selection.selected_pid {
            Some(pid) => prop_assert!(new.entry(pid).is_some()),
            None => prop_assert!(new.is_empty()),
        }
    }
}
