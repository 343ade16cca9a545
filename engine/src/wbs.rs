//! Work breakdown structure code assignment.
//!
//! Assigns each task a stable hierarchical code of the form `1.2.3`: each
//! segment is the 1-based position among siblings under the same parent,
//! and a child's code is always its parent's code plus one segment.
//! Sibling order is the input slice order, so an unchanged input yields
//! byte-identical codes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::Task;

/// Error types for WBS code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WbsError {
    /// A task names a parent that is not in the input.
    MissingParent { task: String, parent: String },
    /// Parent links form a cycle; lists every task caught in it.
    ParentCycle { tasks: Vec<String> },
    /// Two tasks share an id.
    DuplicateTask { task: String },
}

impl std::fmt::Display for WbsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WbsError::MissingParent { task, parent } => {
                write!(f, "Task {} references missing parent {}", task, parent)
            }
            WbsError::ParentCycle { tasks } => {
                write!(f, "Parent links form a cycle among: {}", tasks.join(", "))
            }
            WbsError::DuplicateTask { task } => {
                write!(f, "Duplicate task id: {}", task)
            }
        }
    }
}

impl std::error::Error for WbsError {}

/// Assign WBS codes to every task in the slice.
///
/// The hierarchy comes from `Task::parent` links and must be a forest;
/// this is checked here independently of the precedence graph, which
/// models ordering, not containment.
pub fn generate_wbs(tasks: &[Task]) -> Result<FxHashMap<String, String>, WbsError> {
    let mut ids: FxHashSet<&str> =
        FxHashSet::with_capacity_and_hasher(tasks.len(), Default::default());
    for task in tasks {
        if !ids.insert(task.id.as_str()) {
            return Err(WbsError::DuplicateTask {
                task: task.id.clone(),
            });
        }
    }

    // Children in input order under each parent; roots in input order.
    let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    let mut roots: Vec<&str> = Vec::new();
    for task in tasks {
        match &task.parent {
            Some(parent) => {
                if !ids.contains(parent.as_str()) {
                    return Err(WbsError::MissingParent {
                        task: task.id.clone(),
                        parent: parent.clone(),
                    });
                }
                children.entry(parent.as_str()).or_default().push(&task.id);
            }
            None => roots.push(&task.id),
        }
    }

    let mut codes: FxHashMap<String, String> =
        FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default());
    let mut stack: Vec<&str> = Vec::new();

    for (position, root) in roots.iter().enumerate() {
        codes.insert((*root).to_string(), (position + 1).to_string());
        stack.push(root);
    }

    while let Some(parent) = stack.pop() {
        let Some(kids) = children.get(parent) else {
            continue;
        };
        let parent_code = codes[parent].clone();
        for (position, kid) in kids.iter().enumerate() {
            codes.insert(
                (*kid).to_string(),
                format!("{}.{}", parent_code, position + 1),
            );
            stack.push(kid);
        }
    }

    // Anything unreached sits under a parent cycle.
    if codes.len() != tasks.len() {
        let mut cyclic: Vec<String> = tasks
            .iter()
            .filter(|t| !codes.contains_key(t.id.as_str()))
            .map(|t| t.id.clone())
            .collect();
        cyclic.sort();
        return Err(WbsError::ParentCycle { tasks: cyclic });
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn task(id: &str, parent: Option<&str>) -> Task {
        Task {
            parent: parent.map(String::from),
            ..Task::new(id, id, 1)
        }
    }

    #[test]
    fn test_single_root() {
        let tasks = vec![task("a", None)];
        let codes = generate_wbs(&tasks).unwrap();
        assert_eq!(codes["a"], "1");
    }

    #[test]
    fn test_tree_codes() {
        let tasks = vec![
            task("site", None),
            task("foundation", Some("site")),
            task("framing", Some("site")),
            task("footings", Some("foundation")),
            task("slab", Some("foundation")),
            task("handover", None),
        ];
        let codes = generate_wbs(&tasks).unwrap();
        assert_eq!(codes["site"], "1");
        assert_eq!(codes["foundation"], "1.1");
        assert_eq!(codes["framing"], "1.2");
        assert_eq!(codes["footings"], "1.1.1");
        assert_eq!(codes["slab"], "1.1.2");
        assert_eq!(codes["handover"], "2");
    }

    #[test]
    fn test_codes_unique_and_prefixed() {
        let tasks = vec![
            task("a", None),
            task("b", Some("a")),
            task("c", Some("b")),
            task("d", Some("a")),
        ];
        let codes = generate_wbs(&tasks).unwrap();

        let values: FxHashSet<&String> = codes.values().collect();
        assert_eq!(values.len(), codes.len());

        for t in &tasks {
            if let Some(parent) = &t.parent {
                let child_code = &codes[&t.id];
                let parent_code = &codes[parent];
                let prefix = format!("{}.", parent_code);
                assert!(child_code.starts_with(&prefix));
                assert!(!child_code[prefix.len()..].contains('.'));
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let tasks = vec![
            task("a", None),
            task("b", Some("a")),
            task("c", Some("a")),
        ];
        let first = generate_wbs(&tasks).unwrap();
        let second = generate_wbs(&tasks).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reorder_changes_only_sibling_segment() {
        let before = vec![
            task("a", None),
            task("b", Some("a")),
            task("c", Some("a")),
            task("b1", Some("b")),
        ];
        let after = vec![
            task("a", None),
            task("c", Some("a")),
            task("b", Some("a")),
            task("b1", Some("b")),
        ];
        let codes_before = generate_wbs(&before).unwrap();
        let codes_after = generate_wbs(&after).unwrap();

        assert_eq!(codes_before["a"], codes_after["a"]);
        assert_eq!(codes_before["b"], "1.1");
        assert_eq!(codes_after["b"], "1.2");
        // Descendant follows the moved segment, ancestors untouched
        assert_eq!(codes_after["b1"], "1.2.1");
    }

    #[test]
    fn test_missing_parent() {
        let tasks = vec![task("a", Some("ghost"))];
        assert_eq!(
            generate_wbs(&tasks),
            Err(WbsError::MissingParent {
                task: "a".to_string(),
                parent: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_parent_cycle() {
        let tasks = vec![task("a", Some("b")), task("b", Some("a")), task("ok", None)];
        assert_eq!(
            generate_wbs(&tasks),
            Err(WbsError::ParentCycle {
                tasks: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[test]
    fn test_duplicate_id() {
        let tasks = vec![task("a", None), task("a", None)];
        assert_eq!(
            generate_wbs(&tasks),
            Err(WbsError::DuplicateTask {
                task: "a".to_string(),
            })
        );
    }
}
