// main.rs -- dedicated server entry point. Converted from the init/run-loop
// shape of myq2-original/win32/sys_win.c WinMain() as the teacher's
// myq2-sys::main adapts it, minus the winit window/event loop: this build
// has no renderer, so the tick loop below is the entire program.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use vqcore_common::cmd::{cmd_add_command, cmd_init, CmdContext};
use vqcore_common::common::com_printf;
use vqcore_common::cvar::{cvar_get, cvar_init, cvar_variable_string};
use vqcore_common::infostring::{CVAR_ARCHIVE, CVAR_NOSET, CVAR_SERVERINFO, CVAR_ZERO};
use vqcore_common::net_disco::{build_rcon_request, parse_rcon_reply};
use vqcore_common::qcommon::{NetAdr, NetAdrType, NetSrc, PORT_SERVER};

use vqcore_host::diagnostics::{run_connectivity_probe, run_rule_probe};
use vqcore_host::discovery::{resolve_masters, search_for_hosts};
use vqcore_host::host_tick::HostTick;
use vqcore_host::runtime::HostRuntime;

use vqcore_net::net_common::{NetLink, PORT_ANY};
use vqcore_net::net_udp::{get_addr_from_name, UdpLink};
use vqcore_tasks::TaskSys;

fn register_cvars(args: &[String]) {
    cvar_get("hostname", "Unnamed vqcore server", CVAR_SERVERINFO | CVAR_ARCHIVE);
    cvar_get("mapname", "", CVAR_SERVERINFO);
    cvar_get("gamedir", "", CVAR_SERVERINFO);
    cvar_get("deathmatch", "1", CVAR_SERVERINFO | CVAR_NOSET);
    cvar_get("maxclients", "8", CVAR_SERVERINFO | CVAR_NOSET);
    cvar_get("sv_public", "0", CVAR_ARCHIVE);
    cvar_get("rcon_password", "", CVAR_ZERO);
    cvar_get("port", &PORT_SERVER.to_string(), CVAR_NOSET);

    cvar_get("net_messagetimeout", "300", CVAR_ARCHIVE);
    cvar_get("net_connecttimeout", "10", CVAR_ARCHIVE);
    cvar_get("sv_reportheartbeats", "0", CVAR_ARCHIVE);
    cvar_get("com_protocolname", "QUAKE", CVAR_SERVERINFO);
    cvar_get("net_master1", "", CVAR_ARCHIVE);
    cvar_get("net_master2", "", CVAR_ARCHIVE);
    cvar_get("net_master3", "", CVAR_ARCHIVE);
    cvar_get("net_master4", "", CVAR_ARCHIVE);
    cvar_get("net_masterextra1", "master.quakeservers.net:27950", CVAR_ARCHIVE);
    cvar_get("net_masterextra2", "dpmaster.deathmask.net:27950", CVAR_ARCHIVE);
    cvar_get("net_masterextra3", "dpmaster.tchr.no:27950", CVAR_ARCHIVE);

    // `+set cvar value` pairs on the command line, matching the teacher's
    // own `+set` convention for launch-time overrides.
    let mut i = 0;
    while i < args.len() {
        if args[i] == "+set" && i + 2 < args.len() {
            vqcore_common::cvar::cvar_set(&args[i + 1], &args[i + 2]);
            i += 3;
        } else {
            i += 1;
        }
    }
}

/// Send an RCON request to the server's own listening socket, using the
/// locally configured `rcon_password`. This build has no separate client
/// binary, so `rcon` is a self-administration tool rather than a way to
/// reach some other server.
fn send_local_rcon(local_port: u16, command: &str) {
    let password = cvar_variable_string("rcon_password");
    if password.is_empty() {
        com_printf("rcon: rcon_password is not set\n");
        return;
    }
    let target = NetAdr { adr_type: NetAdrType::Ip, ip: [127, 0, 0, 1], ip6: [0; 16], scope_id: 0, port: local_port.to_be() };
    let mut link = UdpLink::new(NetSrc::Client, "0.0.0.0", PORT_ANY);
    if link.listen(true).is_err() {
        com_printf("rcon: could not open probe socket\n");
        return;
    }
    let request = build_rcon_request(&password, command);
    let _ = link.write(&request.data[..request.cursize as usize], &target);

    let mut buf = [0u8; vqcore_common::qcommon::MAX_NET_MESSAGE];
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        match link.read(&mut buf) {
            Ok(Some((n, _from))) => {
                let mut sb = vqcore_common::qcommon::SizeBuf::new(n as i32);
                sb.data[..n].copy_from_slice(&buf[..n]);
                sb.cursize = n as i32;
                if let Some(output) = parse_rcon_reply(&mut sb) {
                    com_printf(&output);
                }
                break;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            Err(_) => break,
        }
    }
    link.shutdown();
}

fn register_commands(runtime: Arc<HostRuntime>, local_port: u16) {
    {
        let runtime = Arc::clone(&runtime);
        cmd_add_command(
            "net_stats",
            Some(Box::new(move |ctx: &mut CmdContext| {
                let query = if ctx.cmd_argc() > 1 { Some(ctx.cmd_argv(1).to_string()) } else { None };
                com_printf(&runtime.net_stats_report(query.as_deref()));
            })),
        );
    }

    {
        let runtime = Arc::clone(&runtime);
        cmd_add_command(
            "listen",
            Some(Box::new(move |ctx: &mut CmdContext| {
                if ctx.cmd_argc() < 2 {
                    com_printf("usage: listen <0|1>\n");
                    return;
                }
                runtime.request_listen(ctx.cmd_argv(1) != "0");
            })),
        );
    }

    cmd_add_command(
        "maxplayers",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf(&format!("maxplayers is \"{}\"\n", cvar_variable_string("maxclients")));
                return;
            }
            vqcore_common::cvar::cvar_set("maxclients", ctx.cmd_argv(1));
        })),
    );

    cmd_add_command(
        "port",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf(&format!("port is \"{}\"\n", cvar_variable_string("port")));
                return;
            }
            vqcore_common::cvar::cvar_set("port", ctx.cmd_argv(1));
        })),
    );

    cmd_add_command(
        "test",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf("usage: test <host>\n");
                return;
            }
            match get_addr_from_name(ctx.cmd_argv(1)) {
                Some(addr) => {
                    run_connectivity_probe(&addr);
                }
                None => com_printf("test: could not resolve address\n"),
            }
        })),
    );

    cmd_add_command(
        "test2",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf("usage: test2 <host>\n");
                return;
            }
            match get_addr_from_name(ctx.cmd_argv(1)) {
                Some(addr) => {
                    run_rule_probe(&addr);
                }
                None => com_printf("test2: could not resolve address\n"),
            }
        })),
    );

    {
        let runtime = Arc::clone(&runtime);
        cmd_add_command(
            "ban",
            Some(Box::new(move |ctx: &mut CmdContext| {
                if ctx.cmd_argc() < 2 {
                    match runtime.ban_status() {
                        Some((addr, mask)) => com_printf(&format!("banning {} / {}\n", addr, mask)),
                        None => com_printf("ban is off\n"),
                    }
                    return;
                }
                if ctx.cmd_argv(1) == "off" {
                    runtime.clear_ban();
                    com_printf("ban off\n");
                    return;
                }
                let addr: Option<Ipv4Addr> = ctx.cmd_argv(1).parse().ok();
                let mask: Ipv4Addr = if ctx.cmd_argc() > 2 {
                    ctx.cmd_argv(2).parse().unwrap_or(Ipv4Addr::new(255, 255, 255, 255))
                } else {
                    Ipv4Addr::new(255, 255, 255, 255)
                };
                match addr {
                    Some(addr) => {
                        runtime.set_ban(addr, mask);
                        com_printf(&format!("banning {} / {}\n", addr, mask));
                    }
                    None => com_printf("ban: invalid address\n"),
                }
            })),
        );
    }

    cmd_add_command(
        "rcon",
        Some(Box::new(move |ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf("usage: rcon <command>\n");
                return;
            }
            send_local_rcon(local_port, ctx.cmd_args());
        })),
    );

    // Voice chat is out of scope for this build; these commands exist for
    // command-line compatibility and keep bookkeeping-only state.
    cmd_add_command(
        "vignore",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf("usage: vignore <player>\n");
                return;
            }
            com_printf(&format!("ignoring voice from {}\n", ctx.cmd_argv(1)));
        })),
    );
    cmd_add_command("muteall", Some(Box::new(|_ctx: &mut CmdContext| com_printf("muting all voice chat\n"))));
    cmd_add_command("unmuteall", Some(Box::new(|_ctx: &mut CmdContext| com_printf("unmuting all voice chat\n"))));
    cmd_add_command(
        "voicetarg",
        Some(Box::new(|ctx: &mut CmdContext| {
            if ctx.cmd_argc() < 2 {
                com_printf("usage: voicetarg <player|all>\n");
                return;
            }
            com_printf(&format!("voice target set to {}\n", ctx.cmd_argv(1)));
        })),
    );
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    cmd_init();
    cvar_init();
    register_cvars(&args);

    com_printf("vqcore dedicated server starting\n");

    let port = vqcore_common::cvar::cvar_variable_value("port") as i32;
    let mut link = UdpLink::new(vqcore_common::qcommon::NetSrc::Server, "0.0.0.0", port);
    if link.listen(true).is_err() {
        com_printf("FATAL: could not open server UDP socket\n");
        std::process::exit(1);
    }
    let local_port = link.local_port().unwrap_or(port as u16);
    com_printf(&format!("listening on UDP port {local_port}\n"));

    let runtime = Arc::new(HostRuntime::new());
    register_commands(Arc::clone(&runtime), local_port);

    let masters = resolve_masters(&[
        cvar_variable_string("net_master1"),
        cvar_variable_string("net_master2"),
        cvar_variable_string("net_master3"),
        cvar_variable_string("net_master4"),
        cvar_variable_string("net_masterextra1"),
        cvar_variable_string("net_masterextra2"),
        cvar_variable_string("net_masterextra3"),
    ]);
    if !masters.is_empty() {
        let mut sweep = UdpLink::new(NetSrc::Client, "0.0.0.0", PORT_ANY);
        if sweep.listen(true).is_ok() {
            search_for_hosts(&mut sweep, &masters, &mut *runtime.host_cache().lock().unwrap(), Duration::from_millis(300));
            sweep.shutdown();
            com_printf(&format!("host cache: {} server(s) found\n", runtime.host_cache().lock().unwrap().len()));
        }
    }

    let core_ids = std::env::var("VQCORE_WORKER_CORES")
        .ok()
        .map(|s| s.split(',').filter_map(|x| x.trim().parse::<usize>().ok()).collect::<Vec<_>>())
        .filter(|v| !v.is_empty());
    let tasks = TaskSys::new(core_ids);
    com_printf(&format!("task scheduler started with {} workers\n", tasks.num_workers()));

    let max_clients = vqcore_common::cvar::cvar_variable_value("maxclients") as usize;
    let mut tick = HostTick::new(link, local_port, max_clients, Arc::clone(&tasks), runtime);

    loop {
        tick.run_frame();
    }
}
