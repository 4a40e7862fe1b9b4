/*============================================================
  Synavera Project: Syn-Pyx
  Module: synpyx_core::delta
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Compute the additions/removals delta between the local
    inventory snapshot and the remote record sequence.

  Security / Safety Notes:
    Pure in-memory computation; no I/O performed.

  Dependencies:
    None beyond std.

  Operational Scope:
    Runs once per sync cycle over two point-in-time snapshots;
    the result is read-only thereafter.

  Revision History:
    2025-11-12 COD  Authored inventory differ.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Linear-time differencing, no quadratic rescans
    - Deterministic ordering for reproducible cycles
    - First-seen wins on duplicate filenames
============================================================*/

use std::collections::HashSet;

use crate::record::PackageRecord;

/// Immutable additions/removals pair for one sync cycle.
///
/// Additions are remote records absent locally, in remote order. Removals are
/// filename-only stubs for local content absent remotely; always empty in
/// additive mode. The two are disjoint by filename.
#[derive(Debug, Default)]
pub struct Delta {
    pub additions: Vec<PackageRecord>,
    pub removals: Vec<PackageRecord>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Difference the local filename set against the remote record sequence.
///
/// Duplicate filenames within `remote` are collapsed to their first
/// occurrence before differencing; two distributions can never legitimately
/// share a filename. Runs in time linear in |local| + |remote|.
pub fn find_delta(
    local: &HashSet<String>,
    remote: Vec<PackageRecord>,
    mirror: bool,
) -> Delta {
    let mut remote_keys: HashSet<String> = HashSet::with_capacity(remote.len());
    let mut additions = Vec::new();

    for record in remote {
        if !remote_keys.insert(record.filename.clone()) {
            continue;
        }
        if !local.contains(&record.filename) {
            additions.push(record);
        }
    }

    let removals = if mirror {
        let mut gone: Vec<&String> = local
            .iter()
            .filter(|filename| !remote_keys.contains(*filename))
            .collect();
        // The local snapshot is a set with no inherent order; sort for
        // reproducible removal sequences.
        gone.sort();
        gone.into_iter()
            .map(PackageRecord::removal_stub)
            .collect()
    } else {
        Vec::new()
    };

    Delta {
        additions,
        removals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str) -> PackageRecord {
        let mut record = PackageRecord::removal_stub(filename);
        record.name = "shelf".to_string();
        record.version = "1.0".to_string();
        record.packagetype = "sdist".to_string();
        record.url = format!("https://files.example/{filename}");
        record
    }

    fn local(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn filenames(records: &[PackageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.filename.as_str()).collect()
    }

    #[test]
    fn new_remote_records_become_additions() {
        let delta = find_delta(
            &local(&["a-1.0.tar.gz"]),
            vec![record("a-1.0.tar.gz"), record("b-2.0.tar.gz")],
            false,
        );
        assert_eq!(filenames(&delta.additions), vec!["b-2.0.tar.gz"]);
        assert!(delta.removals.is_empty());
    }

    #[test]
    fn shared_content_is_never_removed_in_mirror_mode() {
        let delta = find_delta(
            &local(&["a-1.0.tar.gz"]),
            vec![record("a-1.0.tar.gz"), record("b-2.0.tar.gz")],
            true,
        );
        assert_eq!(filenames(&delta.additions), vec!["b-2.0.tar.gz"]);
        assert!(delta.removals.is_empty());
    }

    #[test]
    fn mirror_mode_schedules_stale_local_content_for_removal() {
        let delta = find_delta(
            &local(&["a-1.0.tar.gz", "old-0.1.tar.gz"]),
            vec![record("a-1.0.tar.gz")],
            true,
        );
        assert!(delta.additions.is_empty());
        assert_eq!(filenames(&delta.removals), vec!["old-0.1.tar.gz"]);
        // Removal records are stubs; only the filename is populated.
        assert!(delta.removals[0].name.is_empty());
    }

    #[test]
    fn additive_mode_never_removes() {
        let delta = find_delta(
            &local(&["only-local-1.0.tar.gz", "other-2.0.tar.gz"]),
            vec![record("fresh-3.0.tar.gz")],
            false,
        );
        assert_eq!(filenames(&delta.additions), vec!["fresh-3.0.tar.gz"]);
        assert!(delta.removals.is_empty());
    }

    #[test]
    fn duplicate_remote_filenames_keep_first_occurrence() {
        let mut first = record("dup-1.0.tar.gz");
        first.version = "1.0".to_string();
        let mut second = record("dup-1.0.tar.gz");
        second.version = "9.9".to_string();

        let delta = find_delta(&HashSet::new(), vec![first, second], true);
        assert_eq!(delta.additions.len(), 1);
        assert_eq!(delta.additions[0].version, "1.0");
    }

    #[test]
    fn additions_and_removals_are_disjoint_and_bounded() {
        let local = local(&["a-1.0.tar.gz", "b-1.0.tar.gz", "stale-1.tar.gz"]);
        let remote = vec![
            record("a-1.0.tar.gz"),
            record("c-1.0.tar.gz"),
            record("d-1.0.tar.gz"),
        ];
        let delta = find_delta(&local, remote, true);

        let addition_names: HashSet<&str> = delta
            .additions
            .iter()
            .map(|r| r.filename.as_str())
            .collect();
        let removal_names: HashSet<&str> = delta
            .removals
            .iter()
            .map(|r| r.filename.as_str())
            .collect();

        assert!(addition_names.is_disjoint(&removal_names));
        for name in &addition_names {
            assert!(!local.contains(*name));
        }
        for name in &removal_names {
            assert!(local.contains(*name));
        }
        assert_eq!(addition_names.len(), 2);
        assert_eq!(removal_names.len(), 2);
    }

    #[test]
    fn differencing_is_idempotent_in_content_and_order() {
        let local = local(&["keep-1.tar.gz", "stale-1.tar.gz", "stale-2.tar.gz"]);
        let remote = || {
            vec![
                record("keep-1.tar.gz"),
                record("new-1.tar.gz"),
                record("new-2.tar.gz"),
            ]
        };
        let first = find_delta(&local, remote(), true);
        let second = find_delta(&local, remote(), true);
        assert_eq!(filenames(&first.additions), filenames(&second.additions));
        assert_eq!(filenames(&first.removals), filenames(&second.removals));
    }

    #[test]
    fn remote_order_is_preserved_in_additions() {
        let delta = find_delta(
            &HashSet::new(),
            vec![
                record("z-1.tar.gz"),
                record("a-1.tar.gz"),
                record("m-1.tar.gz"),
            ],
            false,
        );
        assert_eq!(
            filenames(&delta.additions),
            vec!["z-1.tar.gz", "a-1.tar.gz", "m-1.tar.gz"]
        );
    }
}
