// Circular task store with a single live cursor
//
// Nodes live in a slab (Vec of slots) and link to each other by index,
// so there is no unsafe pointer juggling and removed slots get reused.
// The cursor names the "current" node. Insertion links the new node in
// just behind the cursor, making it the last one visited on the next
// revolution; the cursor itself never moves on insert.
//
// Scans that must not disturb the live cursor take a snapshot `Cursor`
// and walk with `Scan`, which stops after one full revolution.

use alloc::vec::Vec;
use core::fmt;

struct Node<T> {
    val: T,
    next: usize,
    prev: usize,
}

/// Snapshot of a ring position. Shares nodes with the ring; going stale
/// after a removal is harmless (lookups return `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(usize);

pub struct Ring<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    cur: Option<usize>,
    len: usize,
}

impl<T> Ring<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            cur: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, idx: usize) -> &Node<T> {
        match self.slots[idx].as_ref() {
            Some(node) => node,
            None => panic!("ring: dangling link to slot {}", idx),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        match self.slots[idx].as_mut() {
            Some(node) => node,
            None => panic!("ring: dangling link to slot {}", idx),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Link `val` in immediately before the cursor. The cursor keeps
    /// pointing at the same element (or at `val` if the ring was empty).
    pub fn insert_near(&mut self, val: T) -> Cursor {
        let idx = match self.cur {
            None => {
                let idx = self.alloc(Node {
                    val,
                    next: 0,
                    prev: 0,
                });
                let node = self.node_mut(idx);
                node.next = idx;
                node.prev = idx;
                self.cur = Some(idx);
                idx
            }
            Some(cur) => {
                let prev = self.node(cur).prev;
                let idx = self.alloc(Node {
                    val,
                    next: cur,
                    prev,
                });
                self.node_mut(prev).next = idx;
                self.node_mut(cur).prev = idx;
                idx
            }
        };
        self.len += 1;
        Cursor(idx)
    }

    /// Move the live cursor one step forward.
    pub fn advance(&mut self) {
        if let Some(cur) = self.cur {
            self.cur = Some(self.node(cur).next);
        }
    }

    /// Unlink the element under the cursor and hand it back; the cursor
    /// lands on its successor.
    pub fn remove_current(&mut self) -> Option<T> {
        let cur = self.cur?;
        let (next, prev) = {
            let node = self.node(cur);
            (node.next, node.prev)
        };
        if next == cur {
            self.cur = None;
        } else {
            self.node_mut(prev).next = next;
            self.node_mut(next).prev = prev;
            self.cur = Some(next);
        }
        let node = self.slots[cur].take()?;
        self.free.push(cur);
        self.len -= 1;
        Some(node.val)
    }

    pub fn current(&self) -> Option<&T> {
        self.cur.map(|idx| &self.node(idx).val)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        let idx = self.cur?;
        Some(&mut self.node_mut(idx).val)
    }

    /// The element just behind the cursor, i.e. the last one a scan
    /// starting at the cursor visits.
    pub fn last(&self) -> Option<&T> {
        self.cur.map(|idx| &self.node(self.node(idx).prev).val)
    }

    /// Snapshot of the live cursor.
    pub fn cursor(&self) -> Option<Cursor> {
        self.cur.map(Cursor)
    }

    pub fn get(&self, at: Cursor) -> Option<&T> {
        self.slots.get(at.0)?.as_ref().map(|node| &node.val)
    }

    pub fn get_mut(&mut self, at: Cursor) -> Option<&mut T> {
        self.slots.get_mut(at.0)?.as_mut().map(|node| &mut node.val)
    }

    /// Start a one-revolution walk from the live cursor.
    pub fn scan(&self) -> Scan {
        Scan {
            start: self.cur,
            at: self.cur,
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            scan: self.scan(),
        }
    }
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Display> fmt::Display for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, val) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", val)?;
        }
        write!(f, "]")
    }
}

/// A snapshot walk over the ring. Holds no borrow, so the caller may
/// mutate elements between steps; it must not insert or remove.
#[derive(Debug, Clone, Copy)]
pub struct Scan {
    start: Option<usize>,
    at: Option<usize>,
}

impl Scan {
    pub fn next<T>(&mut self, ring: &Ring<T>) -> Option<Cursor> {
        let at = self.at?;
        let next = ring.node(at).next;
        self.at = if Some(next) == self.start {
            None
        } else {
            Some(next)
        };
        Some(Cursor(at))
    }
}

pub struct Iter<'a, T> {
    ring: &'a Ring<T>,
    scan: Scan,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let at = self.scan.next(self.ring)?;
        self.ring.get(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn collect(ring: &Ring<u32>) -> Vec<u32> {
        ring.iter().copied().collect()
    }

    #[test]
    fn test_empty_ring() {
        let mut ring: Ring<u32> = Ring::new();
        assert!(ring.is_empty());
        assert!(ring.current().is_none());
        assert!(ring.last().is_none());
        assert!(ring.remove_current().is_none());
        ring.advance();
        assert_eq!(collect(&ring), vec![]);
    }

    #[test]
    fn test_insert_keeps_cursor() {
        let mut ring = Ring::new();
        ring.insert_near(1);
        ring.insert_near(2);
        ring.insert_near(3);
        assert_eq!(ring.current(), Some(&1));
        assert_eq!(ring.last(), Some(&3));
        assert_eq!(collect(&ring), vec![1, 2, 3]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_advance_wraps() {
        let mut ring = Ring::new();
        for v in 1..=3 {
            ring.insert_near(v);
        }
        ring.advance();
        assert_eq!(ring.current(), Some(&2));
        ring.advance();
        ring.advance();
        assert_eq!(ring.current(), Some(&1));
    }

    #[test]
    fn test_insert_after_advance_lands_behind_cursor() {
        let mut ring = Ring::new();
        ring.insert_near(1);
        ring.insert_near(2);
        ring.advance();
        ring.insert_near(9);
        assert_eq!(ring.current(), Some(&2));
        assert_eq!(collect(&ring), vec![2, 1, 9]);
    }

    #[test]
    fn test_remove_current_advances() {
        let mut ring = Ring::new();
        for v in 1..=3 {
            ring.insert_near(v);
        }
        ring.advance();
        assert_eq!(ring.remove_current(), Some(2));
        assert_eq!(ring.current(), Some(&3));
        assert_eq!(collect(&ring), vec![3, 1]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_remove_last_element_empties() {
        let mut ring = Ring::new();
        ring.insert_near(7);
        assert_eq!(ring.remove_current(), Some(7));
        assert!(ring.is_empty());
        assert!(ring.cursor().is_none());
    }

    #[test]
    fn test_slots_are_reused() {
        let mut ring = Ring::new();
        ring.insert_near(1);
        ring.insert_near(2);
        ring.advance();
        ring.remove_current();
        let at = ring.insert_near(5);
        assert_eq!(ring.get(at), Some(&5));
        assert_eq!(ring.slots.len(), 2);
    }

    #[test]
    fn test_scan_does_not_move_cursor() {
        let mut ring = Ring::new();
        for v in 1..=4 {
            ring.insert_near(v);
        }
        ring.advance();
        let mut scan = ring.scan();
        let mut seen = Vec::new();
        while let Some(at) = scan.next(&ring) {
            if let Some(v) = ring.get_mut(at) {
                *v *= 10;
                seen.push(*v);
            }
        }
        assert_eq!(seen, vec![20, 30, 40, 10]);
        assert_eq!(ring.current(), Some(&20));
    }

    #[test]
    fn test_stale_cursor_reads_none() {
        let mut ring = Ring::new();
        let at = ring.insert_near(1);
        ring.insert_near(2);
        ring.remove_current();
        assert!(ring.get(at).is_none());
    }

    #[test]
    fn test_display() {
        let mut ring = Ring::new();
        ring.insert_near(1);
        ring.insert_near(2);
        assert_eq!(alloc::format!("{}", ring), "[1 2]");
    }
}
