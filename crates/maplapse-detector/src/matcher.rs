use std::collections::HashMap;

use crate::config::MatcherParams;
use crate::features::{DESCRIPTOR_BYTES, Descriptor};

const TABLE_KEY_BITS: usize = 16;
const INDEX_SEED: u64 = 0xd1b5_4a32_d192_ed03;

/// Approximate two-nearest-neighbour index over one frame's descriptors.
///
/// Each of `params.trees` tables hashes descriptors on a fixed 16-bit subset
/// of their bits; queries probe the matching bucket in every table and top up
/// with a deterministic linear scan until `params.checks` exact Hamming
/// distances have been evaluated. The bit subsets derive from a compile-time
/// seed, so identical inputs always produce identical results.
pub struct DescriptorIndex {
    tables: Vec<Table>,
    descriptors: Vec<Descriptor>,
}

struct Table {
    bits: [u16; TABLE_KEY_BITS],
    buckets: HashMap<u16, Vec<u32>>,
}

impl Table {
    fn key_of(&self, descriptor: &Descriptor) -> u16 {
        let mut key = 0u16;
        for (slot, &bit) in self.bits.iter().enumerate() {
            if descriptor.bit(bit as usize) {
                key |= 1 << slot;
            }
        }
        key
    }
}

impl DescriptorIndex {
    pub fn build(descriptors: &[Descriptor], params: &MatcherParams) -> Self {
        let mut state = INDEX_SEED;
        let mut tables = Vec::with_capacity(params.trees.max(1));
        for _ in 0..params.trees.max(1) {
            let mut bits = [0u16; TABLE_KEY_BITS];
            for slot in bits.iter_mut() {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                *slot = ((state >> 33) % (DESCRIPTOR_BYTES as u64 * 8)) as u16;
            }
            tables.push(Table {
                bits,
                buckets: HashMap::new(),
            });
        }

        for (index, descriptor) in descriptors.iter().enumerate() {
            for table in tables.iter_mut() {
                let key = table.key_of(descriptor);
                table.buckets.entry(key).or_default().push(index as u32);
            }
        }

        Self {
            tables,
            descriptors: descriptors.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Distances to the two nearest distinct candidates, or `None` when the
    /// index holds fewer than two descriptors.
    pub fn knn2(&self, query: &Descriptor, scratch: &mut QueryScratch, checks: usize) -> Option<(u32, u32)> {
        let count = self.descriptors.len();
        if count < 2 {
            return None;
        }
        scratch.advance(count);
        let budget = checks.max(2).min(count);

        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut evaluated = 0usize;

        let consider = |index: usize,
                            scratch: &mut QueryScratch,
                            evaluated: &mut usize,
                            best: &mut u32,
                            second: &mut u32| {
            if scratch.visited[index] == scratch.stamp {
                return;
            }
            scratch.visited[index] = scratch.stamp;
            let distance = query.distance(&self.descriptors[index]);
            if distance < *best {
                *second = *best;
                *best = distance;
            } else if distance < *second {
                *second = distance;
            }
            *evaluated += 1;
        };

        let mut start_hint = 0usize;
        'tables: for table in &self.tables {
            let key = table.key_of(query);
            start_hint = start_hint.wrapping_add(key as usize);
            let Some(bucket) = table.buckets.get(&key) else {
                continue;
            };
            for &index in bucket {
                consider(
                    index as usize,
                    scratch,
                    &mut evaluated,
                    &mut best,
                    &mut second,
                );
                if evaluated >= budget {
                    break 'tables;
                }
            }
        }

        // Top up with a deterministic wrap-around scan so every query spends
        // the full `checks` budget and the ratio test always has a
        // second-nearest to compare against.
        let mut cursor = start_hint % count;
        while evaluated < budget {
            consider(cursor, scratch, &mut evaluated, &mut best, &mut second);
            cursor = (cursor + 1) % count;
        }

        Some((best, second))
    }
}

/// Reusable per-query bookkeeping for `knn2`.
#[derive(Default)]
pub struct QueryScratch {
    visited: Vec<u32>,
    stamp: u32,
}

impl QueryScratch {
    fn advance(&mut self, count: usize) {
        if self.visited.len() < count {
            self.visited.resize(count, 0);
        }
        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.visited.fill(0);
            self.stamp = 1;
        }
    }
}

/// Count of template descriptors whose nearest candidate passes the
/// distance-ratio test against the second nearest.
pub fn good_match_count(
    template: &[Descriptor],
    candidate: &[Descriptor],
    params: &MatcherParams,
) -> usize {
    if template.is_empty() || candidate.len() < 2 {
        return 0;
    }
    let index = DescriptorIndex::build(candidate, params);
    let mut scratch = QueryScratch::default();
    let mut good = 0usize;
    for query in template {
        if let Some((best, second)) = index.knn2(query, &mut scratch, params.checks) {
            if second > 0 && (best as f32) < params.ratio * (second as f32) {
                good += 1;
            }
        }
    }
    good
}
