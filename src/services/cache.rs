//! 用户读缓存
//!
//! 缓存条目只是建议性的：过期即丢弃，任何写操作都会删除相关条目。

use crate::models::user::{PageMeta, UserProfile};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn live(&self, now: Instant) -> Option<T> {
        (now < self.expires_at).then(|| self.value.clone())
    }
}

pub struct UserCache {
    enabled: bool,
    user_ttl: Duration,
    list_ttl: Duration,
    users: DashMap<Uuid, Entry<UserProfile>>,
    pages: DashMap<(i64, i64), Entry<(Vec<UserProfile>, PageMeta)>>,
}

impl UserCache {
    pub fn new(enabled: bool, user_ttl: Duration, list_ttl: Duration) -> Self {
        Self {
            enabled,
            user_ttl,
            list_ttl,
            users: DashMap::new(),
            pages: DashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO, Duration::ZERO)
    }

    pub fn get_user(&self, id: Uuid) -> Option<UserProfile> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        let hit = self.users.get(&id).and_then(|e| e.live(now));
        if hit.is_none() {
            self.users.remove_if(&id, |_, e| e.expires_at <= now);
        }
        hit
    }

    pub fn put_user(&self, profile: UserProfile) {
        if !self.enabled {
            return;
        }
        self.users.insert(
            profile.id,
            Entry {
                value: profile,
                expires_at: Instant::now() + self.user_ttl,
            },
        );
    }

    pub fn get_page(&self, page: i64, per_page: i64) -> Option<(Vec<UserProfile>, PageMeta)> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        self.pages.get(&(page, per_page)).and_then(|e| e.live(now))
    }

    pub fn put_page(&self, page: i64, per_page: i64, items: Vec<UserProfile>, meta: PageMeta) {
        if !self.enabled {
            return;
        }
        self.pages.insert(
            (page, per_page),
            Entry {
                value: (items, meta),
                expires_at: Instant::now() + self.list_ttl,
            },
        );
    }

    /// 删除该用户条目以及所有分页（分页中可能包含该用户）
    pub fn invalidate_user(&self, id: Uuid) {
        self.users.remove(&id);
        self.invalidate_pages();
    }

    /// 用户集合变化（如新注册）时分页全部失效
    pub fn invalidate_pages(&self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(name: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@x.com", name),
            is_active: true,
            roles: vec!["STUDENT".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_user_entry_expires() {
        let cache = UserCache::new(true, Duration::from_millis(50), Duration::from_millis(50));
        let ana = profile("ana");
        cache.put_user(ana.clone());
        assert_eq!(cache.get_user(ana.id), Some(ana.clone()));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get_user(ana.id), None);
    }

    #[tokio::test]
    async fn test_invalidate_clears_user_and_pages() {
        let cache = UserCache::new(true, Duration::from_secs(600), Duration::from_secs(300));
        let ana = profile("ana");
        let meta = PageMeta {
            page: 1,
            per_page: 10,
            total: 1,
        };
        cache.put_user(ana.clone());
        cache.put_page(1, 10, vec![ana.clone()], meta);

        cache.invalidate_user(ana.id);
        assert!(cache.get_user(ana.id).is_none());
        assert!(cache.get_page(1, 10).is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = UserCache::disabled();
        let ana = profile("ana");
        cache.put_user(ana.clone());
        assert!(cache.get_user(ana.id).is_none());
    }
}
