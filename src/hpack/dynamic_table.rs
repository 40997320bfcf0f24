// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
//
// The dynamic table, RFC 7541 section 2.3.2 and 4. FIFO eviction keyed on
// the name+value+32 accounting rule.

use std::collections::VecDeque;

use super::static_table;
use crate::header::{HeaderName, HeaderValue};

#[derive(Debug, Clone)]
pub struct DynamicTable {
    // Newest entry at the front, so index 0 is HPACK dynamic index 1.
    entries: VecDeque<(HeaderName, HeaderValue)>,
    size: usize,
    max_size: usize,
}

fn entry_size(name: &HeaderName, value: &HeaderValue) -> usize {
    name.bytes_len() + value.bytes_len() + 32
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current size in octets, per the name+value+32 accounting rule.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Applies a Dynamic Table Size Update. Per RFC 7541 section 4.3,
    /// shrinking evicts down to the new capacity immediately.
    pub fn set_max_size(&mut self, new_max_size: usize) {
        self.max_size = new_max_size;
        self.evict_to_capacity();
    }

    /// Inserts a new entry at the front, evicting from the back until the
    /// table fits. An entry whose own size exceeds the table's capacity
    /// empties the table entirely rather than being stored (RFC 7541
    /// section 4.4).
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        let added = entry_size(&name, &value);
        self.entries.push_front((name, value));
        self.size += added;
        self.evict_to_capacity();
    }

    fn evict_to_capacity(&mut self) {
        while self.size > self.max_size {
            match self.entries.pop_back() {
                Some((name, value)) => self.size -= entry_size(&name, &value),
                None => {
                    self.size = 0;
                    break;
                }
            }
        }
    }

    fn get_relative(&self, dynamic_index: usize) -> Option<&(HeaderName, HeaderValue)> {
        self.entries.get(dynamic_index)
    }

    /// Resolves a 1-based HPACK index against the static table first, then
    /// this dynamic table (RFC 7541 section 2.3.3).
    pub fn get_indexed(&self, index: usize) -> Option<(&HeaderName, &HeaderValue)> {
        if index == 0 {
            return None;
        }
        if let Some(pair) = static_table::get(index) {
            return Some(pair);
        }
        let dynamic_index = index - 1 - static_table::len();
        self.get_relative(dynamic_index).map(|(n, v)| (n, v))
    }

    /// Reverse lookup for the encoder: searches the dynamic table only
    /// (the caller checks the static table separately via
    /// [`static_table::find`]), returning the absolute HPACK index.
    pub fn find(&self, name: &HeaderName, value: &HeaderValue) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, v)| n == name && v == value)
            .map(|i| i + 1 + static_table::len())
    }

    pub fn find_name_only(&self, name: &HeaderName) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| i + 1 + static_table::len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
        (HeaderName::from_static(name), HeaderValue::from_static(value))
    }

    #[test]
    fn evicts_oldest_entry_first() {
        let mut table = DynamicTable::new(64);
        let (n1, v1) = h("a", "1");
        let (n2, v2) = h("b", "2");
        table.insert(n1, v1);
        assert_eq!(table.size(), 34);
        table.insert(n2, v2);
        assert_eq!(table.len(), 2);

        // Force eviction of the oldest ("a") by shrinking capacity.
        table.set_max_size(34);
        assert_eq!(table.len(), 1);
        let (name, _) = table.get_indexed(62).unwrap();
        assert_eq!(name.as_bytes(), b"b");
    }

    #[test]
    fn oversized_entry_empties_the_table() {
        let mut table = DynamicTable::new(40);
        let (n1, v1) = h("a", "1");
        table.insert(n1, v1);
        assert_eq!(table.len(), 1);

        let (n2, v2) = (
            HeaderName::from_bytes(&vec![b'x'; 100]),
            HeaderValue::from_bytes(b"y"),
        );
        table.insert(n2, v2);
        assert_eq!(table.len(), 0);
        assert_eq!(table.size(), 0);
    }

    #[test]
    fn dynamic_indices_follow_static_table() {
        let mut table = DynamicTable::new(4096);
        let (n, v) = h("custom-key", "custom-value");
        table.insert(n, v);
        let first_dynamic_index = static_table::len() + 1;
        let (name, value) = table.get_indexed(first_dynamic_index).unwrap();
        assert_eq!(name.as_bytes(), b"custom-key");
        assert_eq!(value.as_bytes(), b"custom-value");
    }
}
