//! Tree Index
//!
//! Arena of tasks plus a parent -> children index, built once per load.
//! Every walk (subtree, post-order, ancestry, option lists) runs on the
//! index instead of rescanning the flat record list.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::domain::Task;

/// Entry of the hierarchical project picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectOption {
    pub id: u32,
    pub title: String,
    pub depth: usize,
}

/// Flat task list indexed by id and by parent
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    tasks: Vec<Task>,
    slots: HashMap<u32, usize>,
    children: HashMap<Option<u32>, Vec<usize>>,
}

impl TaskTree {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let slots: HashMap<u32, usize> = tasks.iter().enumerate().map(|(slot, t)| (t.id, slot)).collect();

        // Build parent -> children map
        let mut children: HashMap<Option<u32>, Vec<usize>> = HashMap::new();
        for (slot, task) in tasks.iter().enumerate() {
            children.entry(task.parent_id).or_default().push(slot);
        }

        // Roots newest first, everything else in creation (id) order
        for (parent, list) in children.iter_mut() {
            match parent {
                None => list.sort_by(|a, b| {
                    let (a, b) = (&tasks[*a], &tasks[*b]);
                    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
                }),
                Some(_) => list.sort_by_key(|slot| tasks[*slot].id),
            }
        }

        Self { tasks, slots, children }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Task> {
        self.slots.get(&id).map(|slot| &self.tasks[*slot])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Direct children of `parent` (None = root projects)
    pub fn children(&self, parent: Option<u32>) -> impl Iterator<Item = &Task> + '_ {
        self.children
            .get(&parent)
            .into_iter()
            .flatten()
            .map(move |slot| &self.tasks[*slot])
    }

    pub fn has_children(&self, id: u32) -> bool {
        self.children.get(&Some(id)).is_some_and(|list| !list.is_empty())
    }

    pub fn roots(&self) -> impl Iterator<Item = &Task> + '_ {
        self.children(None)
    }

    /// `root` followed by every descendant, breadth first
    ///
    /// Empty when `root` is unknown. A visited set keeps corrupt data with
    /// cycles from looping.
    pub fn subtree_ids(&self, root: u32) -> Vec<u32> {
        if !self.contains(root) {
            return Vec::new();
        }

        let mut family = vec![root];
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(parent) = queue.pop_front() {
            for child in self.children(Some(parent)) {
                if visited.insert(child.id) {
                    family.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        family
    }

    pub fn subtree(&self, root: u32) -> Vec<&Task> {
        self.subtree_ids(root).into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Every node of the subtree with children before their parent
    pub fn post_order_ids(&self, root: u32) -> Vec<u32> {
        if !self.contains(root) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::from([root]);
        // (id, children already pushed)
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.children(Some(id)) {
                if visited.insert(child.id) {
                    stack.push((child.id, false));
                }
            }
        }
        order
    }

    /// True when `candidate` sits somewhere below `ancestor`
    ///
    /// Walks up from `candidate` through parent links.
    pub fn is_descendant(&self, ancestor: u32, candidate: u32) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = self.get(candidate).and_then(|t| t.parent_id);

        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            cursor = self.get(id).and_then(|t| t.parent_id);
        }
        false
    }

    /// Depth-first picker list, siblings sorted by title
    pub fn project_options(&self, filter: Option<&str>) -> Vec<ProjectOption> {
        fn collect(
            tree: &TaskTree,
            parent: Option<u32>,
            depth: usize,
            visited: &mut HashSet<u32>,
            result: &mut Vec<ProjectOption>,
        ) {
            let mut level: Vec<&Task> = tree.children(parent).collect();
            level.sort_by_key(|t| t.title.to_lowercase());

            for task in level {
                if !visited.insert(task.id) {
                    continue;
                }
                result.push(ProjectOption {
                    id: task.id,
                    title: task.title.clone(),
                    depth,
                });
                collect(tree, Some(task.id), depth + 1, visited, result);
            }
        }

        let mut result = Vec::new();
        collect(self, None, 0, &mut HashSet::new(), &mut result);

        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                result.retain(|opt| opt.title.to_lowercase().contains(&term));
                result
            }
            None => result,
        }
    }

    /// Tasks whose parent id points at a task that does not exist
    pub fn ghosts(&self) -> Vec<u32> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.parent_id, Some(pid) if !self.contains(pid)))
            .map(|t| t.id)
            .collect()
    }
}
