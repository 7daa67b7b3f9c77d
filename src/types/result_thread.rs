use std::collections::{BTreeMap, HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use super::result_index::{ResultIndex, SortOrder};

lazy_static! {
    static ref THREAD_MARKER: Regex = Regex::new(r"(?i)^ THREAD").unwrap();
}

/// One message of a thread in flat form: its depth below the thread root and its id.
pub type ThreadItem = (u32, u32);

/// A message and its replies, as returned by [`ResultThread::get_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    /// Message id or UID.
    pub id: u32,
    /// Direct replies, in server order.
    pub children: Vec<ThreadNode>,
}

/// The threads of a `THREAD` response.
///
/// Every thread is stored flat, root first, each message tagged with its depth, so the forest
/// can be flattened or rebuilt without keeping the response text. For
/// `(2)(3 6 (4 23)(44 7 96))` the threads are `[(0,2)]` and
/// `[(0,3) (1,6) (2,4) (3,23) (2,44) (3,7) (4,96)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultThread {
    mailbox: Option<String>,
    order: SortOrder,
    threads: Option<Vec<Vec<ThreadItem>>>,
}

impl ResultThread {
    /// Parse the untagged response text of a `THREAD` command.
    pub fn new(mailbox: Option<String>, data: &str) -> ResultThread {
        let mut result = ResultThread {
            mailbox,
            ..ResultThread::default()
        };
        for part in data.split('*') {
            if let Some(m) = THREAD_MARKER.find(part) {
                let body = part[m.end()..].replace(['\r', '\n'], "");
                result.threads = Some(parse_threads(body.trim().as_bytes()));
                break;
            }
        }
        result
    }

    /// A result in the error state.
    pub fn error(mailbox: Option<String>) -> ResultThread {
        ResultThread {
            mailbox,
            ..ResultThread::default()
        }
    }

    /// Returns true if the response carried no `THREAD` data at all.
    pub fn is_error(&self) -> bool {
        self.threads.is_none()
    }

    /// Returns true if there are no threads (including the error state).
    pub fn is_empty(&self) -> bool {
        self.threads().is_empty()
    }

    fn threads(&self) -> &[Vec<ThreadItem>] {
        self.threads.as_deref().unwrap_or(&[])
    }

    /// The number of threads.
    pub fn count(&self) -> usize {
        self.threads().len()
    }

    /// The number of messages in all threads.
    pub fn count_messages(&self) -> usize {
        self.threads().iter().map(Vec::len).sum()
    }

    /// All message ids, thread by thread, each thread in depth-first order.
    pub fn get(&self) -> Vec<u32> {
        self.threads()
            .iter()
            .flat_map(|t| t.iter().map(|(_, id)| *id))
            .collect()
    }

    /// The flat form of every thread.
    pub fn get_threads(&self) -> &[Vec<ThreadItem>] {
        self.threads()
    }

    /// The smallest message id, 0 if there are none.
    pub fn min(&self) -> u32 {
        self.get().into_iter().min().unwrap_or(0)
    }

    /// The largest message id, 0 if there are none.
    pub fn max(&self) -> u32 {
        self.get().into_iter().max().unwrap_or(0)
    }

    /// Rebuild the forest of threads.
    pub fn get_tree(&self) -> Vec<ThreadNode> {
        self.threads()
            .iter()
            .filter_map(|thread| {
                let (&(_, root), rest) = thread.split_first()?;
                let mut pos = 0;
                Some(ThreadNode {
                    id: root,
                    children: build_level(rest, 1, &mut pos),
                })
            })
            .collect()
    }

    /// Keep only the threads whose root is in `roots`.
    pub fn filter(&mut self, roots: &[u32]) {
        let keep: HashSet<u32> = roots.iter().copied().collect();
        if let Some(threads) = self.threads.as_mut() {
            threads.retain(|t| t.first().map_or(false, |(_, root)| keep.contains(root)));
        }
    }

    /// Order the threads by the position of their messages in `index`.
    ///
    /// Each message of `index` is mapped to its thread root and the roots are emitted in the
    /// order they are first met. Threads without a message in `index` follow in their previous
    /// order. `index` is narrowed to the threaded messages when its size differs.
    pub fn sort(&mut self, index: &mut ResultIndex) {
        self.order = index.order();
        let Some(threads) = self.threads.take() else {
            return;
        };
        if index.count() != threads.iter().map(Vec::len).sum::<usize>() {
            let ids: Vec<u32> = threads.iter().flatten().map(|(_, id)| *id).collect();
            index.filter(&ids);
        }

        let mut root_of: HashMap<u32, u32> = HashMap::new();
        for thread in &threads {
            if let Some(&(_, root)) = thread.first() {
                for &(_, id) in thread {
                    root_of.insert(id, root);
                }
            }
        }

        let mut by_root: BTreeMap<u32, Vec<ThreadItem>> = BTreeMap::new();
        let mut server_order = Vec::with_capacity(threads.len());
        for thread in threads {
            if let Some(&(_, root)) = thread.first() {
                server_order.push(root);
                by_root.insert(root, thread);
            }
        }

        let mut sorted = Vec::with_capacity(by_root.len());
        let mut seen = HashSet::new();
        let roots = index
            .get()
            .iter()
            .filter_map(|id| root_of.get(id).copied())
            .chain(server_order);
        for root in roots {
            if seen.insert(root) {
                if let Some(thread) = by_root.remove(&root) {
                    sorted.push(thread);
                }
            }
        }
        self.threads = Some(sorted);
    }

    /// `MAILBOX` and `ORDER`.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(
            "MAILBOX".to_string(),
            self.mailbox.clone().unwrap_or_default(),
        );
        params.insert("ORDER".to_string(), self.order.to_string());
        params
    }

    /// The result order, taken from the last [`sort`](ResultThread::sort).
    pub fn order(&self) -> SortOrder {
        self.order
    }
}

fn build_level(items: &[ThreadItem], level: u32, pos: &mut usize) -> Vec<ThreadNode> {
    let mut nodes = Vec::new();
    while let Some(&(depth, id)) = items.get(*pos) {
        if depth != level {
            break;
        }
        *pos += 1;
        let children = build_level(items, level + 1, pos);
        nodes.push(ThreadNode { id, children });
    }
    nodes
}

/// Split the top-level parenthesized groups into threads.
fn parse_threads(data: &[u8]) -> Vec<Vec<ThreadItem>> {
    let mut threads = Vec::new();
    for group in groups(data) {
        push_thread(group, &mut threads);
    }
    threads
}

/// A group without a leading id has a dummy root: each of its subgroups is a thread.
fn push_thread(group: &[u8], threads: &mut Vec<Vec<ThreadItem>>) {
    let chain = &group[..chain_end(group)];
    if chain.iter().all(|b| *b == b' ') {
        for sub in groups(group) {
            push_thread(sub, threads);
        }
        return;
    }
    let mut items = Vec::new();
    parse_group(group, 0, &mut items);
    if !items.is_empty() {
        threads.push(items);
    }
}

/// The contents of the parenthesized groups at the top level of `data`.
fn groups(data: &[u8]) -> Vec<&[u8]> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if data[pos] != b'(' {
            pos += 1;
            continue;
        }
        let end = matching_paren(data, pos);
        found.push(&data[pos + 1..end]);
        pos = end + 1;
    }
    found
}

fn chain_end(data: &[u8]) -> usize {
    data.iter()
        .position(|b| *b == b'(' || *b == b')')
        .unwrap_or(data.len())
}

/// The content of one group: a chain of ids, each a reply to the one before, followed by
/// nested groups that all branch from the last id of the chain.
fn parse_group(data: &[u8], mut depth: u32, out: &mut Vec<ThreadItem>) {
    let chain_end = chain_end(data);
    for id in data[..chain_end]
        .split(|b| *b == b' ')
        .filter_map(|n| std::str::from_utf8(n).ok()?.parse().ok())
    {
        out.push((depth, id));
        depth += 1;
    }

    for sub in groups(&data[chain_end..]) {
        parse_group(sub, depth, out);
    }
}

/// Index of the `)` matching the `(` at `open`; the end of input if it is never closed.
fn matching_paren(data: &[u8], open: usize) -> usize {
    let mut level = 0usize;
    for (i, b) in data.iter().enumerate().skip(open) {
        match b {
            b'(' => level += 1,
            b')' => {
                level -= 1;
                if level == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    data.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "* THREAD (2)(3 6 (4 23)(44 7 96))\r\n";

    #[test]
    fn flat_encoding() {
        let t = ResultThread::new(None, SAMPLE);
        assert!(!t.is_error());
        assert_eq!(t.get(), vec![2, 3, 6, 4, 23, 44, 7, 96]);
        assert_eq!(t.count(), 2);
        assert_eq!(t.count_messages(), 8);
        assert_eq!(
            t.get_threads()[1],
            vec![(0, 3), (1, 6), (2, 4), (3, 23), (2, 44), (3, 7), (4, 96)]
        );
        assert_eq!(t.min(), 2);
        assert_eq!(t.max(), 96);
    }

    #[test]
    fn tree() {
        let t = ResultThread::new(None, SAMPLE);
        let leaf = |id| ThreadNode {
            id,
            children: vec![],
        };
        let tree = t.get_tree();
        assert_eq!(tree[0], leaf(2));
        assert_eq!(
            tree[1],
            ThreadNode {
                id: 3,
                children: vec![ThreadNode {
                    id: 6,
                    children: vec![
                        ThreadNode {
                            id: 4,
                            children: vec![leaf(23)]
                        },
                        ThreadNode {
                            id: 44,
                            children: vec![ThreadNode {
                                id: 7,
                                children: vec![leaf(96)]
                            }]
                        },
                    ]
                }]
            }
        );
    }

    #[test]
    fn error_and_empty() {
        assert!(ResultThread::new(None, "* SEARCH 1 2").is_error());
        let empty = ResultThread::new(None, "* THREAD\r\n");
        assert!(!empty.is_error());
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn filter_roots() {
        let mut t = ResultThread::new(None, "* THREAD (1)(2 3)(4)");
        t.filter(&[4, 2]);
        assert_eq!(t.get(), vec![2, 3, 4]);
    }

    #[test]
    fn sort_by_index() {
        let mut t = ResultThread::new(Some("INBOX".into()), SAMPLE);
        let mut index = ResultIndex::new(None, "* SORT 96 2 3 6 4 23 44 7", SortOrder::Desc);
        t.sort(&mut index);
        assert_eq!(t.get(), vec![3, 6, 4, 23, 44, 7, 96, 2]);
        assert_eq!(t.order(), SortOrder::Desc);
    }

    #[test]
    fn sort_narrows_index() {
        let mut t = ResultThread::new(None, "* THREAD (5)(1 2)");
        let mut index = ResultIndex::new(None, "* SORT 9 2 5 8", SortOrder::Asc);
        t.sort(&mut index);
        assert_eq!(index.get(), &[2, 5]);
        assert_eq!(t.get(), vec![1, 2, 5]);
    }

    #[test]
    fn dummy_root_splits_threads() {
        let t = ResultThread::new(None, "* THREAD ((3)(5))(2)\r\n");
        assert_eq!(t.count(), 3);
        assert_eq!(t.get_threads(), &[vec![(0, 3)], vec![(0, 5)], vec![(0, 2)]]);
        let roots: Vec<u32> = t.get_tree().iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![3, 5, 2]);

        let t = ResultThread::new(None, "* THREAD ((1 2)(4 (7)(8)))");
        assert_eq!(t.count(), 2);
        assert_eq!(t.get_threads()[1], vec![(0, 4), (1, 7), (1, 8)]);
    }

    #[test]
    fn unbalanced_is_lenient() {
        let t = ResultThread::new(None, "* THREAD (1 2 (3)");
        assert_eq!(t.get(), vec![1, 2, 3]);
    }
}
