// net_disco.rs -- out-of-band control protocol: connection handshake,
// server browser queries, rcon, and DarkPlaces-style getinfo/getstatus.
// Converted from: myq2-original/qcommon nothing (Quake 2's connection
// handshake lives in the client/server modules, not qcommon); the request
// layout, field order and duplicate-connect window are grounded on
// original_source/Quake/net_dgrm.c's _Datagram_ServerControlPacket.

use crate::cmd::{cmd_argc, cmd_argv, cmd_args, cmd_execute_string, cmd_tokenize_string};
use crate::common::{
    com_begin_redirect, com_end_redirect, msg_begin_reading, msg_read_byte, msg_read_long,
    msg_read_string, msg_write_byte, msg_write_long, msg_write_string,
};
use crate::cvar::cvar_find_serverinfo_after;
use crate::net::net_adr_to_string;
use crate::net_chan::{QSocket, QSocketPool, FLAG_CTL};
use crate::qcommon::{NetAdr, NetAdrType, NetSrc, SizeBuf, NET_PROTOCOL_VERSION};

pub const CCREQ_CONNECT: i32 = 0x01;
pub const CCREQ_SERVER_INFO: i32 = 0x02;
pub const CCREQ_PLAYER_INFO: i32 = 0x03;
pub const CCREQ_RULE_INFO: i32 = 0x04;
/// Not part of the original id1 protocol; assigned the next free request
/// code since the original_source pack never defines one explicitly.
pub const CCREQ_RCON: i32 = 0x05;

pub const CCREP_ACCEPT: i32 = 0x81;
pub const CCREP_REJECT: i32 = 0x82;
pub const CCREP_SERVER_INFO: i32 = 0x83;
pub const CCREP_PLAYER_INFO: i32 = 0x84;
pub const CCREP_RULE_INFO: i32 = 0x85;
pub const CCREP_RCON: i32 = 0x86;

const GAME_NAME: &str = "QUAKE";

/// Window within which a repeated CONNECT from an address already holding a
/// channel is treated as a lost-ACCEPT retry rather than a reconnect.
const DUPLICATE_CONNECT_WINDOW_MS: i64 = 2_000;

/// Seconds between heartbeats to each configured master, while `sv_public`.
pub const HEARTBEAT_INTERVAL_MS: i64 = 300_000;

// ============================================================
// Wire framing helpers
// ============================================================

fn new_control_buf() -> SizeBuf {
    let mut sb = SizeBuf::new(crate::qcommon::MAX_DATAGRAM + 64);
    // Space for the header, patched in by `finish_control_buf`.
    msg_write_long(&mut sb, 0);
    sb
}

/// Patch the reserved header word with `CTL | length` now that the body is
/// written, mirroring the original's "save space, fill in later" pattern.
fn finish_control_buf(sb: &mut SizeBuf) {
    let len = sb.cursize as u32;
    let header = (FLAG_CTL | (len & 0x0000_ffff)) as i32;
    sb.data[0] = (header >> 24) as u8;
    sb.data[1] = (header >> 16) as u8;
    sb.data[2] = (header >> 8) as u8;
    sb.data[3] = header as u8;
}

fn read_control_command(sb: &mut SizeBuf) -> i32 {
    msg_begin_reading(sb);
    msg_read_long(sb); // discard header, already validated by the caller
    msg_read_byte(sb)
}

// ============================================================
// Client-side request builders
// ============================================================

pub fn build_connect_request(proquake_mod: Option<u8>) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREQ_CONNECT);
    msg_write_string(&mut sb, GAME_NAME);
    msg_write_byte(&mut sb, NET_PROTOCOL_VERSION);
    if let Some(mod_id) = proquake_mod {
        msg_write_byte(&mut sb, mod_id as i32);
    }
    finish_control_buf(&mut sb);
    sb
}

pub fn build_server_info_request() -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREQ_SERVER_INFO);
    msg_write_string(&mut sb, GAME_NAME);
    msg_write_byte(&mut sb, NET_PROTOCOL_VERSION);
    finish_control_buf(&mut sb);
    sb
}

pub fn build_player_info_request(player_number: u8) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREQ_PLAYER_INFO);
    msg_write_byte(&mut sb, player_number as i32);
    finish_control_buf(&mut sb);
    sb
}

pub fn build_rule_info_request(prev_key: &str) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREQ_RULE_INFO);
    msg_write_string(&mut sb, prev_key);
    finish_control_buf(&mut sb);
    sb
}

pub fn build_rcon_request(password: &str, command: &str) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREQ_RCON);
    msg_write_string(&mut sb, password);
    msg_write_string(&mut sb, command);
    finish_control_buf(&mut sb);
    sb
}

/// `getinfo <challenge>` or `getstatus <challenge>`, sent as a bare OOB
/// command string rather than the byte-command framing above.
pub fn build_getinfo_request(full: bool, challenge: &str) -> SizeBuf {
    let mut sb = SizeBuf::new(256);
    msg_write_long(&mut sb, -1);
    let verb = if full { "getstatus" } else { "getinfo" };
    msg_write_string(&mut sb, &format!("{} {}", verb, challenge));
    sb
}

// ============================================================
// Client-side reply parsing
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectReply {
    Accept { port: u16, proquake: Option<(u8, u8, u8)> },
    Reject { reason: String },
}

pub fn parse_connect_reply(sb: &mut SizeBuf) -> Option<ConnectReply> {
    let command = read_control_command(sb);
    if command == CCREP_REJECT {
        return Some(ConnectReply::Reject { reason: msg_read_string(sb) });
    }
    if command == CCREP_ACCEPT {
        let port = msg_read_long(sb) as u16;
        let proquake = if sb.readcount < sb.cursize {
            let mod_id = msg_read_byte(sb) as u8;
            let ver = msg_read_byte(sb) as u8;
            let flags = msg_read_byte(sb) as u8;
            Some((mod_id, ver, flags))
        } else {
            None
        };
        return Some(ConnectReply::Accept { port, proquake });
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfoReply {
    pub address: String,
    pub hostname: String,
    pub level_name: String,
    pub current_players: u8,
    pub max_players: u8,
    pub protocol_version: u8,
}

pub fn parse_server_info_reply(sb: &mut SizeBuf) -> Option<ServerInfoReply> {
    if read_control_command(sb) != CCREP_SERVER_INFO {
        return None;
    }
    Some(ServerInfoReply {
        address: msg_read_string(sb),
        hostname: msg_read_string(sb),
        level_name: msg_read_string(sb),
        current_players: msg_read_byte(sb) as u8,
        max_players: msg_read_byte(sb) as u8,
        protocol_version: msg_read_byte(sb) as u8,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfoReply {
    pub player_number: u8,
    pub name: String,
    pub colors: i32,
    pub frags: i32,
    pub connect_time_secs: i32,
    pub address: String,
}

pub fn parse_player_info_reply(sb: &mut SizeBuf) -> Option<PlayerInfoReply> {
    if read_control_command(sb) != CCREP_PLAYER_INFO {
        return None;
    }
    Some(PlayerInfoReply {
        player_number: msg_read_byte(sb) as u8,
        name: msg_read_string(sb),
        colors: msg_read_long(sb),
        frags: msg_read_long(sb),
        connect_time_secs: msg_read_long(sb),
        address: msg_read_string(sb),
    })
}

/// `None` marks the end of enumeration (server sent an empty rule name).
pub fn parse_rule_info_reply(sb: &mut SizeBuf) -> Option<(String, String)> {
    if read_control_command(sb) != CCREP_RULE_INFO {
        return None;
    }
    let name = msg_read_string(sb);
    if name.is_empty() {
        return None;
    }
    let value = msg_read_string(sb);
    Some((name, value))
}

// ============================================================
// Server-side: what the host needs to supply to answer requests
// ============================================================

#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub name: String,
    pub colors: i32,
    pub frags: i32,
    pub connect_time_secs: i32,
    pub address: String,
}

/// Everything NetDisco needs from the host to answer discovery and rcon
/// queries. Implemented by the host crate; kept as a trait here so this
/// module stays free of game-specific state.
pub trait DiscoveryHost {
    fn public(&self) -> bool;
    fn hostname(&self) -> String;
    fn level_name(&self) -> String;
    fn max_clients(&self) -> usize;
    fn active_clients(&self) -> Vec<PlayerSlot>;
    fn rcon_password(&self) -> String;
    fn mod_name(&self) -> String {
        String::new()
    }
    fn deathmatch(&self) -> String {
        String::new()
    }
}

// ============================================================
// Server-side request handlers
// ============================================================

/// A single banned IPv4 address/mask pair, gating `handle_connect_request`.
/// Grounded on `net_dgrm.c`'s `NET_Ban_f`, which keeps exactly one
/// `banAddr`/`banMask` pair rather than a list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BanList {
    ban: Option<(u32, u32)>,
}

impl BanList {
    pub fn new() -> Self {
        Self { ban: None }
    }

    pub fn set(&mut self, addr: std::net::Ipv4Addr, mask: std::net::Ipv4Addr) {
        self.ban = Some((u32::from(addr), u32::from(mask)));
    }

    pub fn off(&mut self) {
        self.ban = None;
    }

    pub fn status(&self) -> Option<(std::net::Ipv4Addr, std::net::Ipv4Addr)> {
        self.ban.map(|(a, m)| (std::net::Ipv4Addr::from(a), std::net::Ipv4Addr::from(m)))
    }

    pub fn is_banned(&self, ip: [u8; 4]) -> bool {
        match self.ban {
            None => false,
            Some((addr, mask)) => {
                let candidate = u32::from_be_bytes(ip);
                (candidate & mask) == (addr & mask)
            }
        }
    }
}

/// Decide the CONNECT/ACCEPT/REJECT outcome, allocating a new `QSocket`
/// when appropriate. Returns the reply bytes to write back to `remote`.
#[allow(clippy::too_many_arguments)]
pub fn handle_connect_request(
    pool: &mut QSocketPool,
    max_clients: usize,
    remote: NetAdr,
    sock: NetSrc,
    local_port: u16,
    proquake_mod: Option<u8>,
    ban_list: &BanList,
    now: i64,
) -> SizeBuf {
    if remote.adr_type == NetAdrType::Ip && ban_list.is_banned(remote.ip) {
        return reject("You have been banned.\n");
    }

    if let Some(existing_idx) = pool.find_by_address(&remote) {
        let existing = pool.get(existing_idx).unwrap();
        if now - existing.connect_time < DUPLICATE_CONNECT_WINDOW_MS {
            let mut sb = new_control_buf();
            msg_write_byte(&mut sb, CCREP_ACCEPT);
            msg_write_long(&mut sb, local_port as i32);
            if proquake_mod == Some(1) {
                msg_write_byte(&mut sb, 1);
                msg_write_byte(&mut sb, 30);
                msg_write_byte(&mut sb, 0);
            }
            finish_control_buf(&mut sb);
            return sb;
        }
        // Stale connection from the same address; close it and let the
        // retry win a fresh slot below.
        pool.close(existing_idx);
    }

    if pool.iter_active().count() >= max_clients {
        let mut sb = new_control_buf();
        msg_write_byte(&mut sb, CCREP_REJECT);
        msg_write_string(&mut sb, "Server is full.\n");
        finish_control_buf(&mut sb);
        return sb;
    }

    pool.allocate(QSocket::new(remote, sock, true, now));

    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_ACCEPT);
    msg_write_long(&mut sb, local_port as i32);
    if proquake_mod == Some(1) {
        msg_write_byte(&mut sb, 1);
        msg_write_byte(&mut sb, 30);
        msg_write_byte(&mut sb, 0);
    }
    finish_control_buf(&mut sb);
    sb
}

pub fn reject(reason: &str) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_REJECT);
    msg_write_string(&mut sb, reason);
    finish_control_buf(&mut sb);
    sb
}

pub fn handle_server_info_request(host: &dyn DiscoveryHost, local_addr: &NetAdr) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_SERVER_INFO);
    msg_write_string(&mut sb, &net_adr_to_string(local_addr));
    msg_write_string(&mut sb, &host.hostname());
    msg_write_string(&mut sb, &host.level_name());
    msg_write_byte(&mut sb, host.active_clients().len() as i32);
    msg_write_byte(&mut sb, host.max_clients() as i32);
    msg_write_byte(&mut sb, NET_PROTOCOL_VERSION);
    finish_control_buf(&mut sb);
    sb
}

pub fn handle_player_info_request(host: &dyn DiscoveryHost, player_number: u8) -> Option<SizeBuf> {
    let slot = host.active_clients().into_iter().nth(player_number as usize)?;
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_PLAYER_INFO);
    msg_write_byte(&mut sb, player_number as i32);
    msg_write_string(&mut sb, &slot.name);
    msg_write_long(&mut sb, slot.colors);
    msg_write_long(&mut sb, slot.frags);
    msg_write_long(&mut sb, slot.connect_time_secs);
    msg_write_string(&mut sb, &slot.address);
    finish_control_buf(&mut sb);
    Some(sb)
}

/// `prev_key` empty starts the enumeration; an empty reply name marks the
/// end, matching `parse_rule_info_reply`'s termination rule.
pub fn handle_rule_info_request(prev_key: &str) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_RULE_INFO);
    if let Some((name, value)) = cvar_find_serverinfo_after(prev_key) {
        msg_write_string(&mut sb, &name);
        msg_write_string(&mut sb, &value);
    }
    finish_control_buf(&mut sb);
    sb
}

/// Execute `command` under the redirect hook if `password` matches the
/// host's rcon password, returning the captured output (or a refusal
/// message, never executed).
pub fn handle_rcon_request(host: &dyn DiscoveryHost, password: &str, command: &str) -> String {
    let configured = host.rcon_password();
    if configured.is_empty() {
        return "rcon is not enabled on this server\n".to_string();
    }
    if password != configured {
        return "Your password is just WRONG dude.\n".to_string();
    }
    com_begin_redirect();
    cmd_execute_string(command);
    com_end_redirect().unwrap_or_default()
}

pub fn build_rcon_reply(output: &str) -> SizeBuf {
    let mut sb = new_control_buf();
    msg_write_byte(&mut sb, CCREP_RCON);
    msg_write_string(&mut sb, output);
    finish_control_buf(&mut sb);
    sb
}

/// Client-side counterpart to `build_rcon_reply`, for the `rcon` console
/// command to read the remote's response.
pub fn parse_rcon_reply(sb: &mut SizeBuf) -> Option<String> {
    if read_control_command(sb) != CCREP_RCON {
        return None;
    }
    Some(msg_read_string(sb))
}

/// Build the DarkPlaces-style `infoResponse`/`statusResponse` reply to a
/// `getinfo`/`getstatus` query. `challenge` is echoed back verbatim.
pub fn handle_getinfo_request(host: &dyn DiscoveryHost, full: bool, challenge: &str) -> SizeBuf {
    let mut sb = SizeBuf::new(crate::qcommon::MAX_DATAGRAM + 256);
    msg_write_long(&mut sb, -1);
    let body_start = sb.cursize;
    msg_write_string(&mut sb, if full { "statusResponse" } else { "infoResponse\n" });
    sb.cursize -= 1;

    let clients = host.active_clients();
    let mut info = String::new();
    info.push_str(&format!("\\protocol\\{}", NET_PROTOCOL_VERSION));
    if !host.mod_name().is_empty() {
        info.push_str(&format!("\\modname\\{}", host.mod_name()));
    }
    info.push_str(&format!("\\mapname\\{}", host.level_name()));
    if !host.deathmatch().is_empty() {
        info.push_str(&format!("\\deathmatch\\{}", host.deathmatch()));
    }
    info.push_str(&format!("\\hostname\\{}", host.hostname()));
    info.push_str(&format!("\\clients\\{}", clients.len()));
    info.push_str(&format!("\\sv_maxclients\\{}", host.max_clients()));
    if !challenge.is_empty() {
        info.push_str(&format!("\\challenge\\{}", challenge));
    }
    msg_write_string(&mut sb, &info);
    sb.cursize -= 1;

    if full {
        for slot in &clients {
            msg_write_string(
                &mut sb,
                &format!("\n{} 0 0_0 \"{}\"", slot.frags, slot.name),
            );
            sb.cursize -= 1;
        }
    }
    let _ = body_start;
    sb
}

/// Dispatch a parsed `getinfo`/`getstatus` command line, already stripped
/// of its leading `\xff\xff\xff\xff`.
pub fn try_handle_getinfo(host: &dyn DiscoveryHost, line: &str) -> Option<SizeBuf> {
    cmd_tokenize_string(line, false);
    if cmd_argc() == 0 {
        return None;
    }
    let verb = cmd_argv(0);
    if verb != "getinfo" && verb != "getstatus" {
        return None;
    }
    if !host.public() {
        return None;
    }
    let full = verb == "getstatus";
    Some(handle_getinfo_request(host, full, &cmd_args()))
}

// ============================================================
// Poll schedule
// ============================================================

/// What a scheduled procedure wants to happen next.
pub enum PollOutcome {
    /// Nothing more to do; drop the procedure.
    Done,
    /// Run again at this time, nothing to send this round.
    Reschedule(i64),
    /// Run again at this time, and send these bytes (broadcast) now.
    RescheduleWithOutput(i64, Vec<u8>),
}

type Procedure = Box<dyn FnMut(i64) -> PollOutcome + Send>;

/// Sorted list of one-shot callbacks due at a given time, the basis for any
/// periodic OOB activity. Grounded on `net_defs.h`'s
/// `SchedulePollProcedure`/`pollProcedure_t`, which the original's `Test_f`/
/// `Test2_f` use for their own poll loops and which also drives the master
/// heartbeat here instead of a bespoke timer.
pub struct PollSchedule {
    entries: Vec<(i64, Procedure)>,
}

impl PollSchedule {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn schedule(&mut self, when: i64, proc: impl FnMut(i64) -> PollOutcome + Send + 'static) {
        self.entries.push((when, Box::new(proc)));
        self.entries.sort_by_key(|e| e.0);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every procedure due by `now`, collecting the bytes any of them
    /// want broadcast. Rescheduling procedures are reinserted in sorted
    /// order so the next `poll` call picks up exactly where this left off.
    pub fn poll(&mut self, now: i64) -> Vec<Vec<u8>> {
        let mut outputs = Vec::new();
        loop {
            match self.entries.first() {
                Some(&(t, _)) if t <= now => {}
                _ => break,
            }
            let (_, mut proc) = self.entries.remove(0);
            match proc(now) {
                PollOutcome::Done => {}
                PollOutcome::Reschedule(next) => self.entries.push((next, proc)),
                PollOutcome::RescheduleWithOutput(next, bytes) => {
                    outputs.push(bytes);
                    self.entries.push((next, proc));
                }
            }
            self.entries.sort_by_key(|e| e.0);
        }
        outputs
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedule the recurring `sv_public` heartbeat: due immediately, then every
/// `HEARTBEAT_INTERVAL_MS` after. `public` is sampled fresh on each firing
/// rather than captured once, since the cvar can flip between ticks.
pub fn schedule_heartbeat(schedule: &mut PollSchedule, now: i64, public: impl Fn() -> bool + Send + 'static) {
    schedule.schedule(now, move |now| {
        let next = now + HEARTBEAT_INTERVAL_MS;
        if !public() {
            return PollOutcome::Reschedule(next);
        }
        let mut sb = SizeBuf::new(64);
        msg_write_long(&mut sb, -1);
        msg_write_string(&mut sb, "heartbeat DarkPlaces\n");
        PollOutcome::RescheduleWithOutput(next, sb.data[..sb.cursize as usize].to_vec())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcommon::NetAdrType;

    fn addr() -> NetAdr {
        NetAdr { adr_type: NetAdrType::Ip, ip: [10, 0, 0, 1], ip6: [0; 16], scope_id: 0, port: 27500u16.to_be() }
    }

    struct FakeHost {
        clients: Vec<PlayerSlot>,
        password: String,
    }

    impl DiscoveryHost for FakeHost {
        fn public(&self) -> bool {
            true
        }
        fn hostname(&self) -> String {
            "test server".to_string()
        }
        fn level_name(&self) -> String {
            "start".to_string()
        }
        fn max_clients(&self) -> usize {
            8
        }
        fn active_clients(&self) -> Vec<PlayerSlot> {
            self.clients
                .iter()
                .map(|c| PlayerSlot {
                    name: c.name.clone(),
                    colors: c.colors,
                    frags: c.frags,
                    connect_time_secs: c.connect_time_secs,
                    address: c.address.clone(),
                })
                .collect()
        }
        fn rcon_password(&self) -> String {
            self.password.clone()
        }
    }

    #[test]
    fn connect_request_roundtrips_through_accept() {
        let mut pool = QSocketPool::new(4);
        let mut sb = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &BanList::new(), 0);
        let reply = parse_connect_reply(&mut sb).unwrap();
        assert_eq!(reply, ConnectReply::Accept { port: 27500, proquake: None });
        assert_eq!(pool.iter_active().count(), 1);
    }

    #[test]
    fn duplicate_connect_within_window_reuses_slot() {
        let mut pool = QSocketPool::new(4);
        let _ = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &BanList::new(), 0);
        assert_eq!(pool.iter_active().count(), 1);
        let mut sb = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &BanList::new(), 500);
        let reply = parse_connect_reply(&mut sb).unwrap();
        assert_eq!(reply, ConnectReply::Accept { port: 27500, proquake: None });
        assert_eq!(pool.iter_active().count(), 1);
    }

    #[test]
    fn connect_after_window_expires_allocates_fresh_slot() {
        let mut pool = QSocketPool::new(4);
        let _ = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &BanList::new(), 0);
        let idx_before = pool.find_by_address(&addr()).unwrap();
        let _ = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &BanList::new(), 5_000);
        let idx_after = pool.find_by_address(&addr()).unwrap();
        assert_eq!(pool.iter_active().count(), 1);
        assert_ne!(idx_before, idx_after);
    }

    #[test]
    fn connect_rejected_when_server_full() {
        let mut pool = QSocketPool::new(1);
        let _ = handle_connect_request(&mut pool, 1, addr(), NetSrc::Server, 27500, None, &BanList::new(), 0);
        let other = NetAdr { ip: [10, 0, 0, 2], ..addr() };
        let mut sb = handle_connect_request(&mut pool, 1, other, NetSrc::Server, 27500, None, &BanList::new(), 0);
        let reply = parse_connect_reply(&mut sb).unwrap();
        matches!(reply, ConnectReply::Reject { .. });
    }

    #[test]
    fn server_info_request_reply_roundtrips() {
        let host = FakeHost { clients: vec![], password: String::new() };
        let mut sb = handle_server_info_request(&host, &addr());
        let reply = parse_server_info_reply(&mut sb).unwrap();
        assert_eq!(reply.hostname, "test server");
        assert_eq!(reply.level_name, "start");
        assert_eq!(reply.current_players, 0);
        assert_eq!(reply.max_players, 8);
    }

    #[test]
    fn player_info_request_reply_roundtrips() {
        let host = FakeHost {
            clients: vec![PlayerSlot {
                name: "Ranger".to_string(),
                colors: 17,
                frags: 3,
                connect_time_secs: 120,
                address: "10.0.0.5:27501".to_string(),
            }],
            password: String::new(),
        };
        let mut sb = handle_player_info_request(&host, 0).unwrap();
        let reply = parse_player_info_reply(&mut sb).unwrap();
        assert_eq!(reply.name, "Ranger");
        assert_eq!(reply.frags, 3);
        assert_eq!(reply.address, "10.0.0.5:27501");
    }

    #[test]
    fn player_info_request_out_of_range_returns_none() {
        let host = FakeHost { clients: vec![], password: String::new() };
        assert!(handle_player_info_request(&host, 0).is_none());
    }

    #[test]
    fn rcon_without_password_configured_refuses() {
        let host = FakeHost { clients: vec![], password: String::new() };
        let out = handle_rcon_request(&host, "anything", "status");
        assert!(out.contains("not enabled"));
    }

    #[test]
    fn rcon_with_wrong_password_refuses() {
        let host = FakeHost { clients: vec![], password: "secret".to_string() };
        let out = handle_rcon_request(&host, "guess", "status");
        assert!(out.contains("WRONG"));
    }

    #[test]
    fn heartbeat_fires_once_per_interval() {
        let mut schedule = PollSchedule::new();
        schedule_heartbeat(&mut schedule, 0, || true);
        assert_eq!(schedule.poll(0).len(), 1);
        assert!(schedule.poll(1_000).is_empty());
        assert_eq!(schedule.poll(HEARTBEAT_INTERVAL_MS).len(), 1);
    }

    #[test]
    fn heartbeat_suppressed_when_not_public() {
        let mut schedule = PollSchedule::new();
        schedule_heartbeat(&mut schedule, 0, || false);
        assert!(schedule.poll(0).is_empty());
        // Still reschedules for the next interval even when skipped.
        assert!(!schedule.is_empty());
    }

    #[test]
    fn poll_schedule_runs_generic_one_shot_procedures() {
        let mut schedule = PollSchedule::new();
        schedule.schedule(100, |_now| PollOutcome::Done);
        assert!(schedule.poll(50).is_empty());
        assert!(schedule.poll(100).is_empty());
        assert!(schedule.is_empty());
    }

    #[test]
    fn ban_list_rejects_banned_address() {
        let mut pool = QSocketPool::new(4);
        let mut bans = BanList::new();
        bans.set("10.0.0.1".parse().unwrap(), "255.255.255.255".parse().unwrap());
        let mut sb = handle_connect_request(&mut pool, 8, addr(), NetSrc::Server, 27500, None, &bans, 0);
        let reply = parse_connect_reply(&mut sb).unwrap();
        assert!(matches!(reply, ConnectReply::Reject { .. }));
        assert_eq!(pool.iter_active().count(), 0);
    }

    #[test]
    fn ban_list_off_clears_ban() {
        let mut bans = BanList::new();
        bans.set("10.0.0.1".parse().unwrap(), "255.255.255.255".parse().unwrap());
        assert!(bans.is_banned([10, 0, 0, 1]));
        bans.off();
        assert!(!bans.is_banned([10, 0, 0, 1]));
    }
}
