// runtime.rs -- state shared between the tick loop and console commands
// registered via cmd_add_command. Modeled on the teacher's cl_main.rs,
// which routes command handlers through shared/global client state rather
// than threading a &mut of the frame-owning struct through the dispatcher;
// here the frame-owning struct is HostTick, which commands never see.

use std::sync::Mutex;

use vqcore_common::host_cache::HostCache;
use vqcore_common::net_chan::{format_channel_stats, ChannelStats};
use vqcore_common::net_disco::BanList;

/// One connected channel's address and counters, as of the last tick.
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub index: usize,
    pub address: String,
    pub stats: ChannelStats,
}

#[derive(Default)]
struct Snapshot {
    aggregate: ChannelStats,
    channels: Vec<ChannelSnapshot>,
}

/// Shared server-runtime state. `HostTick` owns the write side (refreshed
/// once per tick); console commands only read it, or make the narrowly
/// scoped writes `ban`/`unban` need.
pub struct HostRuntime {
    ban_list: Mutex<BanList>,
    snapshot: Mutex<Snapshot>,
    host_cache: Mutex<HostCache>,
    requested_listen: Mutex<Option<bool>>,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self {
            ban_list: Mutex::new(BanList::new()),
            snapshot: Mutex::new(Snapshot::default()),
            host_cache: Mutex::new(HostCache::new()),
            requested_listen: Mutex::new(None),
        }
    }

    /// `listen <0|1>`: request the tick loop open or close the accept
    /// socket on its next frame. Commands never touch `UdpLink` directly
    /// since they run without a `&mut HostTick`.
    pub fn request_listen(&self, enable: bool) {
        *self.requested_listen.lock().unwrap() = Some(enable);
    }

    pub fn take_requested_listen(&self) -> Option<bool> {
        self.requested_listen.lock().unwrap().take()
    }

    pub fn ban_list(&self) -> BanList {
        *self.ban_list.lock().unwrap()
    }

    pub fn set_ban(&self, addr: std::net::Ipv4Addr, mask: std::net::Ipv4Addr) {
        self.ban_list.lock().unwrap().set(addr, mask);
    }

    pub fn clear_ban(&self) {
        self.ban_list.lock().unwrap().off();
    }

    pub fn ban_status(&self) -> Option<(std::net::Ipv4Addr, std::net::Ipv4Addr)> {
        self.ban_list.lock().unwrap().status()
    }

    pub fn update_snapshot(&self, aggregate: ChannelStats, channels: Vec<ChannelSnapshot>) {
        let mut s = self.snapshot.lock().unwrap();
        s.aggregate = aggregate;
        s.channels = channels;
    }

    pub fn host_cache(&self) -> &Mutex<HostCache> {
        &self.host_cache
    }

    /// Render the `net_stats` reply for no argument (aggregate), `*` (every
    /// channel), or a peer address/prefix (one channel's counters).
    pub fn net_stats_report(&self, query: Option<&str>) -> String {
        let s = self.snapshot.lock().unwrap();
        match query {
            None => format_channel_stats(&s.aggregate),
            Some("*") => {
                if s.channels.is_empty() {
                    return "no active channels\n".to_string();
                }
                let mut out = String::new();
                for c in &s.channels {
                    out.push_str(&format!("[{}] {}\n{}", c.index, c.address, format_channel_stats(&c.stats)));
                }
                out
            }
            Some(needle) => s
                .channels
                .iter()
                .find(|c| c.address.eq_ignore_ascii_case(needle) || c.address.starts_with(needle))
                .map(|c| format_channel_stats(&c.stats))
                .unwrap_or_else(|| format!("no channel matching '{}'\n", needle)),
        }
    }
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}
