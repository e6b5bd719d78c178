// Fingerprint Reconciler - matches on-disk files against recorded entries

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::{AmbiguousMatch, DiskEntry, FileFingerprint, ReconciliationResult, RecordedEntry};

/// Reconcile previously recorded file entries against the current disk scan.
///
/// Pure and synchronous; applying the change-set (imports, record moves,
/// deletions) is the caller's responsibility and runs as a new batch job.
///
/// Passes, each entry consumed at most once:
/// 1. exact path match -> `matched`
/// 2. fingerprint `(basename, size, mtime)` at a different path: exactly one
///    recorded entry and one disk entry sharing the print -> `moved`; any
///    other collision -> `ambiguous`, surfaced with the full candidate list
///    instead of guessed
/// 3. recorded entries left over -> `deleted`
/// 4. disk entries left over and not referenced by an ambiguity -> `new`
///
/// Grouping by fingerprint (rather than claiming candidates first-come)
/// keeps the result identical regardless of input ordering.
pub fn reconcile(recorded: &[RecordedEntry], disk: &[DiskEntry]) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();

    let mut disk_claimed = vec![false; disk.len()];
    let mut disk_by_path: HashMap<&str, usize> = HashMap::with_capacity(disk.len());
    for (idx, entry) in disk.iter().enumerate() {
        // Last one wins on duplicate paths; scanners do not emit duplicates
        disk_by_path.insert(entry.path.as_str(), idx);
    }

    // Pass 1: exact path
    let mut unmatched_recorded: Vec<usize> = Vec::new();
    for (rec_idx, rec) in recorded.iter().enumerate() {
        match disk_by_path.get(rec.path.as_str()) {
            Some(&disk_idx) if !disk_claimed[disk_idx] => {
                disk_claimed[disk_idx] = true;
                result.matched.push((rec.clone(), disk[disk_idx].clone()));
            }
            _ => unmatched_recorded.push(rec_idx),
        }
    }

    // Pass 2: fingerprint groups over the still-unclaimed remainder
    let mut recorded_by_print: HashMap<FileFingerprint, Vec<usize>> = HashMap::new();
    for &rec_idx in &unmatched_recorded {
        recorded_by_print
            .entry(recorded[rec_idx].fingerprint())
            .or_default()
            .push(rec_idx);
    }
    let mut disk_by_print: HashMap<FileFingerprint, Vec<usize>> = HashMap::new();
    for (disk_idx, entry) in disk.iter().enumerate() {
        if !disk_claimed[disk_idx] {
            disk_by_print
                .entry(entry.fingerprint())
                .or_default()
                .push(disk_idx);
        }
    }

    let mut recorded_claimed: HashSet<usize> = HashSet::new();
    let mut ambiguous_disk: HashSet<usize> = HashSet::new();
    for (print, rec_group) in &recorded_by_print {
        let Some(candidates) = disk_by_print.get(print) else {
            continue; // no disk entry shares the print: falls through to deleted
        };

        if rec_group.len() == 1 && candidates.len() == 1 {
            let (rec_idx, disk_idx) = (rec_group[0], candidates[0]);
            recorded_claimed.insert(rec_idx);
            disk_claimed[disk_idx] = true;
            result
                .moved
                .push((recorded[rec_idx].clone(), disk[disk_idx].clone()));
        } else {
            // True ambiguity: several possible moves share one fingerprint.
            // Claim the recorded entries so they are not double-reported as
            // deleted; leave the disk candidates unclaimed but keep them out
            // of `new` so the operator reviews each path exactly once.
            debug!(
                name = %print.name,
                records = %rec_group.len(),
                candidates = %candidates.len(),
                "Ambiguous fingerprint collision"
            );
            let mut candidate_entries: Vec<DiskEntry> =
                candidates.iter().map(|&i| disk[i].clone()).collect();
            candidate_entries.sort_by(|a, b| a.path.cmp(&b.path));
            for &rec_idx in rec_group {
                recorded_claimed.insert(rec_idx);
                result.ambiguous.push(AmbiguousMatch {
                    recorded: recorded[rec_idx].clone(),
                    candidates: candidate_entries.clone(),
                });
            }
            ambiguous_disk.extend(candidates.iter().copied());
        }
    }

    // Pass 3: deleted
    for &rec_idx in &unmatched_recorded {
        if !recorded_claimed.contains(&rec_idx) {
            result.deleted.push(recorded[rec_idx].clone());
        }
    }

    // Pass 4: new
    for (disk_idx, entry) in disk.iter().enumerate() {
        if !disk_claimed[disk_idx] && !ambiguous_disk.contains(&disk_idx) {
            result.new.push(entry.clone());
        }
    }

    // Canonical ordering: identical output for any input permutation
    result.matched.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    result.moved.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    result.deleted.sort_by(|a, b| a.path.cmp(&b.path));
    result.new.sort_by(|a, b| a.path.cmp(&b.path));
    result.ambiguous.sort_by(|a, b| a.recorded.path.cmp(&b.recorded.path));

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: i64, path: &str, name: &str, size: u64, mtime: i64) -> RecordedEntry {
        RecordedEntry {
            id,
            path: path.to_string(),
            name: name.to_string(),
            size_bytes: size,
            mtime,
        }
    }

    fn disk(path: &str, name: &str, size: u64, mtime: i64) -> DiskEntry {
        DiskEntry {
            path: path.to_string(),
            name: name.to_string(),
            size_bytes: size,
            mtime,
        }
    }

    #[test]
    fn test_exact_path_match() {
        let recorded = vec![rec(1, "/a/x.mp4", "x.mp4", 100, 10)];
        let on_disk = vec![disk("/a/x.mp4", "x.mp4", 100, 10)];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].0.id, 1);
        assert_eq!(result.matched[0].1.path, "/a/x.mp4");
        assert!(result.moved.is_empty());
        assert!(result.deleted.is_empty());
        assert!(result.new.is_empty());
        assert!(result.ambiguous.is_empty());
    }

    #[test]
    fn test_exact_path_wins_over_metadata_drift() {
        // Same path, different size: still matched, no move inferred
        let recorded = vec![rec(1, "/a/x.mp4", "x.mp4", 100, 10)];
        let on_disk = vec![disk("/a/x.mp4", "x.mp4", 999, 99)];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.matched.len(), 1);
        assert!(result.new.is_empty());
    }

    #[test]
    fn test_single_candidate_move() {
        let recorded = vec![rec(1, "/old/x.mp4", "x.mp4", 100, 10)];
        let on_disk = vec![disk("/new/x.mp4", "x.mp4", 100, 10)];

        let result = reconcile(&recorded, &on_disk);
        assert!(result.matched.is_empty());
        assert_eq!(result.moved.len(), 1);
        assert_eq!(result.moved[0].0.id, 1);
        assert_eq!(result.moved[0].1.path, "/new/x.mp4");
        assert!(result.deleted.is_empty());
        assert!(result.new.is_empty());
    }

    #[test]
    fn test_two_candidates_is_ambiguous() {
        let recorded = vec![rec(1, "/old/x.mp4", "x.mp4", 100, 10)];
        let on_disk = vec![
            disk("/new/a/x.mp4", "x.mp4", 100, 10),
            disk("/new/b/x.mp4", "x.mp4", 100, 10),
        ];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.ambiguous.len(), 1);
        assert_eq!(result.ambiguous[0].recorded.id, 1);
        assert_eq!(result.ambiguous[0].candidates.len(), 2);
        // Neither candidate claimed as moved or new
        assert!(result.moved.is_empty());
        assert!(result.new.is_empty());
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn test_two_records_one_candidate_is_ambiguous() {
        // The inverse collision: claiming first-come would make the outcome
        // depend on input order, so both records are surfaced instead
        let recorded = vec![
            rec(1, "/a/x.mp4", "x.mp4", 100, 10),
            rec(2, "/b/x.mp4", "x.mp4", 100, 10),
        ];
        let on_disk = vec![disk("/c/x.mp4", "x.mp4", 100, 10)];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.ambiguous.len(), 2);
        assert!(result.moved.is_empty());
        assert!(result.deleted.is_empty());
        assert!(result.new.is_empty());
    }

    #[test]
    fn test_deleted_and_new() {
        let recorded = vec![rec(1, "/a/gone.mp4", "gone.mp4", 100, 10)];
        let on_disk = vec![disk("/b/fresh.mp4", "fresh.mp4", 200, 20)];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.deleted[0].id, 1);
        assert_eq!(result.new.len(), 1);
        assert_eq!(result.new[0].path, "/b/fresh.mp4");
    }

    #[test]
    fn test_mixed_change_set() {
        let recorded = vec![
            rec(1, "/lib/a.mp4", "a.mp4", 10, 1),
            rec(2, "/lib/b.mp4", "b.mp4", 20, 2),
            rec(3, "/lib/c.mp4", "c.mp4", 30, 3),
        ];
        let on_disk = vec![
            disk("/lib/a.mp4", "a.mp4", 10, 1),     // matched
            disk("/archive/b.mp4", "b.mp4", 20, 2), // moved
            disk("/lib/d.mp4", "d.mp4", 40, 4),     // new
        ];

        let result = reconcile(&recorded, &on_disk);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.moved.len(), 1);
        assert_eq!(result.moved[0].0.id, 2);
        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.deleted[0].id, 3);
        assert_eq!(result.new.len(), 1);
        assert_eq!(result.new[0].name, "d.mp4");
    }

    #[test]
    fn test_deterministic_under_input_reordering() {
        let recorded = vec![
            rec(1, "/lib/a.mp4", "a.mp4", 10, 1),
            rec(2, "/lib/b.mp4", "b.mp4", 20, 2),
            rec(3, "/lib/c.mp4", "c.mp4", 30, 3),
            rec(4, "/lib/dup.mp4", "dup.mp4", 50, 5),
        ];
        let on_disk = vec![
            disk("/lib/a.mp4", "a.mp4", 10, 1),
            disk("/archive/b.mp4", "b.mp4", 20, 2),
            disk("/x/dup.mp4", "dup.mp4", 50, 5),
            disk("/y/dup.mp4", "dup.mp4", 50, 5),
            disk("/lib/d.mp4", "d.mp4", 40, 4),
        ];

        let forward = reconcile(&recorded, &on_disk);

        let mut recorded_rev = recorded.clone();
        recorded_rev.reverse();
        let mut disk_rev = on_disk.clone();
        disk_rev.reverse();
        let backward = reconcile(&recorded_rev, &disk_rev);

        assert_eq!(forward, backward);
        assert_eq!(forward.ambiguous.len(), 1);
        assert_eq!(forward.ambiguous[0].candidates.len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let result = reconcile(&[], &[]);
        assert!(result.is_empty());
    }
}
