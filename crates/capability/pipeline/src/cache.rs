use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
    token: u64,
}

/// 带过期时间与容量上限的缓存。
///
/// 所有条目 TTL 相同，因此写入顺序即过期顺序：队首条目最先过期，容量超限时也从队首淘汰。
/// 刷新已有 key 会生成新 token，队列中旧 token 在出队时被忽略。
pub struct TtlCache<K, V> {
    map: HashMap<K, Entry<V>>,
    order: VecDeque<(K, u64)>,
    counter: u64,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            counter: 0,
            capacity,
            ttl,
        }
    }

    /// 读取未过期的条目（不刷新 TTL）。
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.purge_expired(Instant::now());
        self.map.get(key).map(|entry| &entry.value)
    }

    pub fn contains_key(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// 写入或刷新条目，TTL 从当前时刻重新计算。
    pub fn insert(&mut self, key: K, value: V) {
        let now = Instant::now();
        self.purge_expired(now);

        self.counter = self.counter.saturating_add(1);
        let token = self.counter;
        self.map.insert(
            key.clone(),
            Entry {
                value,
                expires_at: now + self.ttl,
                token,
            },
        );
        self.order.push_back((key, token));

        while self.map.len() > self.capacity {
            match self.order.pop_front() {
                Some((evict_key, evict_token)) => self.remove_if_current(&evict_key, evict_token),
                None => break,
            }
        }
        self.compact();
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn len(&mut self) -> usize {
        self.purge_expired(Instant::now());
        self.map.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&mut self, now: Instant) {
        while let Some((key, token)) = self.order.front() {
            match self.map.get(key) {
                Some(entry) if entry.token == *token => {
                    if entry.expires_at > now {
                        break;
                    }
                    self.map.remove(key);
                }
                _ => {}
            }
            self.order.pop_front();
        }
    }

    fn remove_if_current(&mut self, key: &K, token: u64) {
        let current = self
            .map
            .get(key)
            .map(|entry| entry.token == token)
            .unwrap_or(false);
        if current {
            self.map.remove(key);
        }
    }

    /// 频繁刷新同一 key 会在队列中堆积旧 token，超过阈值时整理一次。
    fn compact(&mut self) {
        if self.order.len() <= self.capacity.saturating_mul(2).max(16) {
            return;
        }
        let map = &self.map;
        self.order.retain(|(key, token)| {
            map.get(key)
                .map(|entry| entry.token == *token)
                .unwrap_or(false)
        });
    }
}
