// discovery.rs -- searchForHosts: broadcast a SERVER_INFO request on the LAN
// and query each configured master, collecting replies into a HostCache.
// Converted from: original_source/Quake/net_dgrm.c's
// _Datagram_SearchForHosts, which does the LAN broadcast half of this; the
// master-query half is simplified here to the same SERVER_INFO/getinfo
// exchange rather than implementing DarkPlaces' separate getservers wire
// format, since no master in this build actually answers the DP protocol.

use std::time::{Duration, Instant};

use vqcore_common::host_cache::HostCache;
use vqcore_common::net::net_adr_to_string;
use vqcore_common::net_disco::{build_server_info_request, parse_server_info_reply};
use vqcore_common::qcommon::{NetAdr, MAX_NET_MESSAGE};

use vqcore_net::net_common::NetLink;

/// Broadcast on `link` and query each of `masters`, folding every
/// `SERVER_INFO` reply that arrives before `timeout` into `cache`.
pub fn search_for_hosts(link: &mut dyn NetLink, masters: &[NetAdr], cache: &mut HostCache, timeout: Duration) {
    let request = build_server_info_request();
    let payload = &request.data[..request.cursize as usize];

    let _ = link.broadcast(payload);
    for master in masters {
        let _ = link.write(payload, master);
    }

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_NET_MESSAGE];
    while Instant::now() < deadline {
        match link.read(&mut buf) {
            Ok(Some((n, from))) => {
                let mut sb = vqcore_common::qcommon::SizeBuf::new(n as i32);
                sb.data[..n].copy_from_slice(&buf[..n]);
                sb.cursize = n as i32;
                if let Some(reply) = parse_server_info_reply(&mut sb) {
                    let cname = net_adr_to_string(&from);
                    cache.add(
                        from,
                        cname,
                        reply.hostname,
                        reply.level_name,
                        String::new(),
                        reply.current_players as u32,
                        reply.max_players as u32,
                    );
                }
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            Err(_) => break,
        }
    }
}

/// Parse the comma/space-separated `net_masterN`/`net_masterextraN` cvar
/// values into resolved addresses, skipping blank entries.
pub fn resolve_masters(values: &[String]) -> Vec<NetAdr> {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .filter_map(|v| vqcore_net::net_udp::get_addr_from_name(v))
        .collect()
}
