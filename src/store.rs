//! Fixed-capacity chained hash store for per-client hit tracking.
//!
//! Keys are structured (client, resource, site, whitelist variants) and map
//! to a `{last_seen, count}` record. The bucket count is fixed at creation,
//! chosen as the smallest prime at or above the requested capacity; chains
//! absorb collisions and the table never rehashes or grows. Size the table
//! generously: entries are only released at teardown.

use std::net::IpAddr;

/// Ascending table sizes, all prime.
const PRIME_TABLE: [u64; 28] = [
    53,
    97,
    193,
    389,
    769,
    1543,
    3079,
    6151,
    12289,
    24593,
    49157,
    98317,
    196613,
    393241,
    786433,
    1572869,
    3145739,
    6291469,
    12582917,
    25165843,
    50331653,
    100663319,
    201326611,
    402653189,
    805306457,
    1610612741,
    3221225473,
    4294967291,
];

/// Tracking key. Each variant is an independent namespace: a client hold,
/// a per-resource counter, a per-site counter, or a whitelist entry seeded
/// at configuration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKey {
    /// Bare client identifier; presence with a fresh timestamp means "held".
    Client(IpAddr),
    /// Client + resource path composite for the per-resource window.
    Resource { client: IpAddr, path: String },
    /// Client-wide composite for the per-site window.
    Site(IpAddr),
    /// Whitelist entry, literal IP text or an IPv4 wildcard pattern
    /// such as `10.1.*.*`. Timestamp semantics unused.
    WhitelistIp(String),
}

impl StoreKey {
    /// Polynomial rolling hash (`h = 5h + byte`, wrapping) over the variant
    /// tag and payload bytes. Deterministic across runs.
    fn hash(&self) -> u64 {
        let mut h = PolyHash::default();
        match self {
            StoreKey::Client(ip) => {
                h.write(&[0]);
                h.write_ip(ip);
            }
            StoreKey::Resource { client, path } => {
                h.write(&[1]);
                h.write_ip(client);
                h.write(path.as_bytes());
            }
            StoreKey::Site(ip) => {
                h.write(&[2]);
                h.write_ip(ip);
            }
            StoreKey::WhitelistIp(pattern) => {
                h.write(&[3]);
                h.write(pattern.as_bytes());
            }
        }
        h.0
    }
}

#[derive(Default)]
struct PolyHash(u64);

impl PolyHash {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(5).wrapping_add(u64::from(b));
        }
    }

    fn write_ip(&mut self, ip: &IpAddr) {
        match ip {
            IpAddr::V4(v4) => {
                self.write(&[4]);
                self.write(&v4.octets());
            }
            IpAddr::V6(v6) => {
                self.write(&[6]);
                self.write(&v6.octets());
            }
        }
    }
}

/// One tracked record: the key, the timestamp of the most recent touch
/// (integer seconds), and the hit count accumulated since the last reset.
#[derive(Clone, Debug)]
pub struct Entry {
    pub key: StoreKey,
    pub last_seen: u64,
    pub count: u64,
}

/// Chained hash table with a fixed prime bucket count.
///
/// No internal locking: callers that share a store across workers must
/// serialize access (see [`Detector`](crate::detector::Detector)).
pub struct HitStore {
    buckets: Box<[Vec<Entry>]>,
    items: usize,
}

impl HitStore {
    /// Create a store sized to the smallest prime table size at or above
    /// `capacity_hint`, clamped to the largest table size.
    pub fn with_capacity(capacity_hint: usize) -> Self {
        let size = PRIME_TABLE
            .iter()
            .find(|&&p| p >= capacity_hint as u64)
            .copied()
            .unwrap_or(PRIME_TABLE[PRIME_TABLE.len() - 1]);

        Self {
            buckets: vec![Vec::new(); size as usize].into_boxed_slice(),
            items: 0,
        }
    }

    /// Number of entries currently tracked.
    pub fn len(&self) -> usize {
        self.items
    }

    /// True if no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Bucket count selected at creation.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, key: &StoreKey) -> usize {
        (key.hash() % self.buckets.len() as u64) as usize
    }

    /// Look up an entry by exact key. O(1) expected, O(chain) worst case.
    pub fn find(&self, key: &StoreKey) -> Option<&Entry> {
        let idx = self.bucket_of(key);
        self.buckets[idx].iter().find(|e| e.key == *key)
    }

    /// Mutable lookup by exact key.
    pub fn find_mut(&mut self, key: &StoreKey) -> Option<&mut Entry> {
        let idx = self.bucket_of(key);
        self.buckets[idx].iter_mut().find(|e| e.key == *key)
    }

    /// Insert a fresh entry, or reset an existing one.
    ///
    /// An existing entry has its count zeroed and timestamp set to `now`;
    /// a missing key gets a new `{count: 0, last_seen: now}` entry on its
    /// bucket chain. This is a touch, not a hit: callers increment the
    /// count themselves after inspecting the window.
    ///
    /// Returns `None` when the item count is at its representable maximum;
    /// the key simply goes untracked.
    pub fn insert_or_touch(&mut self, key: StoreKey, now: u64) -> Option<&mut Entry> {
        let idx = self.bucket_of(&key);

        if let Some(pos) = self.buckets[idx].iter().position(|e| e.key == key) {
            let entry = &mut self.buckets[idx][pos];
            entry.last_seen = now;
            entry.count = 0;
            return Some(entry);
        }

        if self.items == usize::MAX {
            return None;
        }

        self.buckets[idx].push(Entry {
            key,
            last_seen: now,
            count: 0,
        });
        self.items += 1;
        self.buckets[idx].last_mut()
    }

    /// Remove an entry. Returns false if the key was not present.
    pub fn remove(&mut self, key: &StoreKey) -> bool {
        let idx = self.bucket_of(key);
        match self.buckets[idx].iter().position(|e| e.key == *key) {
            Some(pos) => {
                self.buckets[idx].remove(pos);
                self.items -= 1;
                true
            }
            None => false,
        }
    }

    /// Walk every entry, bucket 0..N-1 and each chain in order.
    ///
    /// Finite and restartable per call; not valid to interleave with
    /// mutation. Intended for teardown and inspection.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.buckets.iter().flat_map(|chain| chain.iter())
    }

    /// Drop every entry, leaving the bucket array in place.
    pub fn clear(&mut self) {
        for chain in self.buckets.iter_mut() {
            chain.clear();
        }
        self.items = 0;
    }
}
