// host_cache.rs -- bounded table of servers discovered by browsing, filled
// in from SERVER_INFO replies and de-duplicated by canonical address.
// Converted from: myq2-original/qcommon nothing (id1 Quake2 has no LAN
// browser of its own); table shape and insertion rules grounded on
// original_source/Quake/net_defs.h's hostcache_t/HOSTCACHESIZE and
// net_dgrm.c's _Datagram_SearchForHosts name-conflict suffixing.

use crate::net::net_compare_base_adr;
use crate::qcommon::NetAdr;

pub const HOSTCACHESIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCacheEntry {
    /// Display name, possibly suffixed to disambiguate a collision.
    pub name: String,
    pub map: String,
    pub mod_name: String,
    pub users: u32,
    pub max_users: u32,
    /// Canonical address string, used for de-duplication.
    pub cname: String,
    pub addr: NetAdr,
}

/// Fixed-capacity table of discovered servers.
pub struct HostCache {
    entries: Vec<HostCacheEntry>,
}

impl HostCache {
    pub fn new() -> Self {
        Self { entries: Vec::with_capacity(HOSTCACHESIZE) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= HOSTCACHESIZE
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostCacheEntry> {
        self.entries.iter()
    }

    pub fn find_by_address(&self, addr: &NetAdr) -> Option<usize> {
        self.entries.iter().position(|e| net_compare_base_adr(&e.addr, addr))
    }

    /// Insert (or refresh) an entry learned from a `SERVER_INFO`/getinfo
    /// reply. Returns `false` if the table is full and `addr` is not
    /// already present. Resolves a display-name collision against an
    /// existing entry with a different address by incrementing the last
    /// character, or appending a digit if it's already near the cap,
    /// exactly mirroring the original's suffixing rule.
    pub fn add(&mut self, addr: NetAdr, cname: String, mut name: String, map: String, mod_name: String, users: u32, max_users: u32) -> bool {
        if name.is_empty() {
            name = "UNNAMED".to_string();
        }

        if let Some(idx) = self.find_by_address(&addr) {
            self.entries[idx] = HostCacheEntry { name, map, mod_name, users, max_users, cname, addr };
            return true;
        }

        if self.is_full() {
            return false;
        }

        while let Some(collision) = self.entries.iter().position(|e| e.name.eq_ignore_ascii_case(&name)) {
            let _ = collision;
            name = bump_name_suffix(&name);
        }

        self.entries.push(HostCacheEntry { name, map, mod_name, users, max_users, cname, addr });
        true
    }
}

impl Default for HostCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Disambiguate a colliding display name: bump the trailing digit, or start
/// a new one at "0" if the name is already near its storage cap or its last
/// character isn't a digit below '8'.
fn bump_name_suffix(name: &str) -> String {
    const MAX_NAME_LEN: usize = 15;
    let mut bytes: Vec<u8> = name.bytes().collect();
    let last = *bytes.last().unwrap_or(&b'0');
    if bytes.len() < MAX_NAME_LEN && last > b'8' {
        bytes.push(b'0');
    } else if let Some(last_mut) = bytes.last_mut() {
        *last_mut += 1;
    } else {
        bytes.push(b'0');
    }
    String::from_utf8(bytes).unwrap_or_else(|_| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcommon::NetAdrType;

    fn addr(last_octet: u8) -> NetAdr {
        NetAdr { adr_type: NetAdrType::Ip, ip: [10, 0, 0, last_octet], ip6: [0; 16], scope_id: 0, port: 27500u16.to_be() }
    }

    #[test]
    fn add_and_find_by_address() {
        let mut cache = HostCache::new();
        assert!(cache.add(addr(1), "10.0.0.1:27500".to_string(), "Server A".to_string(), "start".to_string(), String::new(), 2, 8));
        assert_eq!(cache.len(), 1);
        assert!(cache.find_by_address(&addr(1)).is_some());
    }

    #[test]
    fn re_adding_same_address_refreshes_in_place() {
        let mut cache = HostCache::new();
        cache.add(addr(1), "10.0.0.1:27500".to_string(), "Server A".to_string(), "start".to_string(), String::new(), 2, 8);
        cache.add(addr(1), "10.0.0.1:27500".to_string(), "Server A".to_string(), "e1m2".to_string(), String::new(), 3, 8);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.iter().next().unwrap().map, "e1m2");
        assert_eq!(cache.iter().next().unwrap().users, 3);
    }

    #[test]
    fn name_collision_gets_suffixed() {
        let mut cache = HostCache::new();
        cache.add(addr(1), "10.0.0.1:27500".to_string(), "Quake Server".to_string(), "start".to_string(), String::new(), 0, 8);
        cache.add(addr(2), "10.0.0.2:27500".to_string(), "Quake Server".to_string(), "start".to_string(), String::new(), 0, 8);
        let names: Vec<&str> = cache.iter().map(|e| e.name.as_str()).collect();
        assert_ne!(names[0], names[1]);
        assert!(names[1].starts_with("Quake Server"));
    }

    #[test]
    fn empty_name_defaults_to_unnamed() {
        let mut cache = HostCache::new();
        cache.add(addr(1), "10.0.0.1:27500".to_string(), String::new(), "start".to_string(), String::new(), 0, 8);
        assert_eq!(cache.iter().next().unwrap().name, "UNNAMED");
    }

    #[test]
    fn table_rejects_new_entries_once_full() {
        let mut cache = HostCache::new();
        for i in 0..HOSTCACHESIZE as u8 {
            assert!(cache.add(addr(i), format!("10.0.0.{}:27500", i), format!("Server {}", i), "start".to_string(), String::new(), 0, 8));
        }
        assert!(cache.is_full());
        assert!(!cache.add(addr(200), "10.0.0.200:27500".to_string(), "Overflow".to_string(), "start".to_string(), String::new(), 0, 8));
        assert_eq!(cache.len(), HOSTCACHESIZE);
    }
}
