// diagnostics.rs -- raw connectivity probes behind the `test`/`test2`
// console commands. Converted from:
// original_source/Quake/net_dgrm.c's Test_f/Test_Poll and Test2_f/
// Test2_Poll, which open a throwaway unreliable socket to a host and print
// whatever comes back, rather than going through the full CONNECT handshake.

use std::time::{Duration, Instant};

use vqcore_common::common::com_printf;
use vqcore_common::net_disco::{
    build_player_info_request, build_rule_info_request, parse_player_info_reply,
    parse_rule_info_reply, PlayerInfoReply,
};
use vqcore_common::qcommon::{NetAdr, NetSrc, SizeBuf, MAX_NET_MESSAGE};

use vqcore_net::net_common::{NetLink, PORT_ANY};
use vqcore_net::net_udp::UdpLink;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_PLAYER_SLOTS: u8 = 16;

fn read_one(link: &mut UdpLink, deadline: Instant, buf: &mut [u8]) -> Option<SizeBuf> {
    while Instant::now() < deadline {
        match link.read(buf) {
            Ok(Some((n, _from))) => {
                let mut sb = SizeBuf::new(n as i32);
                sb.data[..n].copy_from_slice(&buf[..n]);
                sb.cursize = n as i32;
                return Some(sb);
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            Err(_) => return None,
        }
    }
    None
}

/// `test <host>`: poke every player slot on `target` and print whatever
/// replies arrive within the timeout. Opens its own socket rather than
/// reusing the server's listening link, matching the original's separate
/// probe connection.
pub fn run_connectivity_probe(target: &NetAdr) -> Vec<PlayerInfoReply> {
    let mut link = UdpLink::new(NetSrc::Client, "0.0.0.0", PORT_ANY);
    if link.listen(true).is_err() {
        com_printf("test: could not open probe socket\n");
        return Vec::new();
    }

    for player in 0..MAX_PLAYER_SLOTS {
        let sb = build_player_info_request(player);
        let _ = link.write(&sb.data[..sb.cursize as usize], target);
    }

    let mut replies = Vec::new();
    let deadline = Instant::now() + PROBE_TIMEOUT;
    let mut buf = [0u8; MAX_NET_MESSAGE];
    while Instant::now() < deadline {
        if let Some(mut sb) = read_one(&mut link, deadline, &mut buf) {
            if let Some(reply) = parse_player_info_reply(&mut sb) {
                com_printf(&format!("player {}: {} ({} frags)\n", reply.player_number, reply.name, reply.frags));
                replies.push(reply);
            }
        } else {
            break;
        }
    }
    link.shutdown();
    replies
}

/// `test2 <host>`: walk the RULE_INFO chain to completion, printing each
/// serverinfo key/value pair as it arrives.
pub fn run_rule_probe(target: &NetAdr) -> Vec<(String, String)> {
    let mut link = UdpLink::new(NetSrc::Client, "0.0.0.0", PORT_ANY);
    if link.listen(true).is_err() {
        com_printf("test2: could not open probe socket\n");
        return Vec::new();
    }

    let mut rules = Vec::new();
    let mut prev_key = String::new();
    let mut buf = [0u8; MAX_NET_MESSAGE];
    loop {
        let sb = build_rule_info_request(&prev_key);
        let _ = link.write(&sb.data[..sb.cursize as usize], target);

        let deadline = Instant::now() + PROBE_TIMEOUT;
        let reply = read_one(&mut link, deadline, &mut buf).and_then(|mut sb| parse_rule_info_reply(&mut sb));
        match reply {
            Some((name, value)) => {
                com_printf(&format!("{} = {}\n", name, value));
                prev_key = name.clone();
                rules.push((name, value));
            }
            None => break,
        }
    }
    link.shutdown();
    rules
}
