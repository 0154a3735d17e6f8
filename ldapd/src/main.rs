/*
    This file is part of Donet.

    Copyright © 2024 Max Rodriguez <me@maxrdz.com>

    Donet is free software; you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License,
    as published by the Free Software Foundation, either version 3
    of the License, or (at your option) any later version.

    Donet is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public
    License along with Donet. If not, see <https://www.gnu.org/licenses/>.
*/

//! # ldapd
//! An LDAPv3 directory server core: syntax/matching-rule registry,
//! replicated-entry wire codec, mapping-tree request routing,
//! content-sync refresh/persist engines, and a pluggable storage
//! backend, wired together behind a TCP listener.

#![deny(unused_extern_crates)]

use ldap_backend::{Backend, MemoryBackend};
use ldap_daemon::config::LdapdConfig;
use ldap_daemon::logger;
use ldap_daemon::logger::DaemonLogger;
use ldap_daemon::meson::*;
use ldap_daemon::service::set_future_return_type;
use ldap_routing::connection::{Connection, HookRegistry};
use ldap_routing::tree::{BackendSlot, MappingTree, NodeState};
use ldap_sync::persist::PersistEngine;
use log::*;
use std::fs::File;
use std::io::{Error, ErrorKind, Read};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

macro_rules! init_logger {
    ($level:expr) => {
        pub static GLOBAL_LOGGER: DaemonLogger = DaemonLogger { log_level: $level };
        logger::init_logger(&GLOBAL_LOGGER)?;

        info!("Log level set at {}.", $level);
    };
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_file: &str = DEFAULT_TOML;

    if args.len() > 1 {
        for (index, argument) in args.iter().enumerate() {
            if index == 0 {
                continue; // skip invoked binary name
            }
            if argument == "-h" || argument == "--help" {
                print_help_page();
                return Ok(());
            } else if argument == "-v" || argument == "--version" {
                print_version();
                return Ok(());
            } else if argument.starts_with('-') {
                println!("{}: {}: Invalid flag.\n", BINARY, argument);
                print_help_page();
                return Ok(());
            } else if index == (args.len() - 1) {
                config_file = argument.as_str();
            } else {
                println!("{}: {}: Invalid argument.\n", BINARY, argument);
                print_help_page();
                return Ok(());
            }
        }
    }

    let mut conf_file: File = match File::open(config_file) {
        Err(err) => {
            println!("Could not load TOML configuration.");
            println!("{} cannot start without a configuration file present.", BINARY);
            return Err(err);
        }
        Ok(file) => file,
    };

    let mut contents: String = String::new();
    conf_file.read_to_string(&mut contents)?;
    drop(conf_file);

    let config: LdapdConfig = match toml::from_str(contents.as_str()) {
        Ok(config) => config,
        Err(err) => {
            error!("An error occurred while parsing the TOML configuration.");
            return Err(Error::new(ErrorKind::InvalidInput, err.message()));
        }
    };
    drop(contents);

    if let Some(log_level) = &config.daemon.log_level {
        match log_level.as_str() {
            "error" => {
                init_logger!(log::Level::Error);
            }
            "warn" => {
                init_logger!(log::Level::Warn);
            }
            "info" => {
                init_logger!(log::Level::Info);
            }
            "debug" => {
                init_logger!(log::Level::Debug);
            }
            "trace" => {
                init_logger!(log::Level::Trace);
            }
            _ => panic!("Could not initialize logger. Error in log level string in TOML configuration."),
        }
    } else {
        init_logger!(log::Level::Info);
    }

    drop(args);

    let tokio_runtime: Runtime = Builder::new_multi_thread()
        .enable_io()
        .thread_stack_size(2 * 1024 * 1024)
        .build()?;

    let daemon_async_main = async move {
        let mapping_tree = build_mapping_tree(&config).await?;
        let backend: Arc<dyn Backend> = build_backend(&config)?;
        let persist_engine = Arc::new(PersistEngine::new(config.sync.max_persist_sessions));
        let hooks = Arc::new(HookRegistry::default());

        info!("Opening listening socket at {}.", config.daemon.bind);
        let listener = TcpListener::bind(&config.daemon.bind).await?;

        let mut connection_handles: Vec<JoinHandle<()>> = vec![];

        let accept_loop = async {
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!("Failed to accept a connection: {}", err);
                        continue;
                    }
                };
                debug!("Accepted connection from {}.", peer);

                let hooks = hooks.clone();
                let handle = tokio::spawn(async move {
                    let client = match ldap_network::LdapClient::new(socket).await {
                        Ok(client) => client,
                        Err(err) => {
                            warn!("Failed to initialize client transport for {}: {}", peer, err);
                            return;
                        }
                    };
                    let _connection = Connection::new(client, hooks);
                    // LDAPMessage decode/dispatch (Bind, Search, Modify, ...)
                    // is not part of this core; the components built here are
                    // the mapping tree, the backend, and the sync engines that
                    // a full operation dispatcher would sit on top of.
                    todo!("LDAPMessage dispatch is not yet implemented.")
                });
                connection_handles.push(handle);
            }
        };

        tokio::select! {
            _ = accept_loop => {}
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        println!();
                        info!("Received interrupt (Ctrl + C)");
                    }
                    Err(err) => {
                        error!("Unable to listen for shutdown signal: {}", err);
                        panic!("Tokio was not able to listen to the interrupt signal.")
                    }
                }
            }
        }

        info!("Exiting...");
        for handle in &connection_handles {
            handle.abort();
        }
        drop(mapping_tree);
        drop(backend);
        drop(persist_engine);
        Ok(())
    };

    set_future_return_type::<std::io::Result<()>, _>(&daemon_async_main);

    tokio_runtime.block_on(daemon_async_main)
}

async fn build_mapping_tree(config: &LdapdConfig) -> std::io::Result<MappingTree> {
    let tree = MappingTree::new();

    for suffix in &config.mapping_tree.suffix {
        let state = match suffix.state.as_str() {
            "disabled" => NodeState::Disabled,
            "backend" => NodeState::Backend,
            "referral" => NodeState::Referral,
            "referral-on-update" => NodeState::ReferralOnUpdate,
            "container" => NodeState::Container,
            other => {
                error!("Unknown mapping-tree state {:?} for suffix {:?}.", other, suffix.suffix);
                return Err(Error::new(ErrorKind::InvalidInput, "invalid mapping-tree state"));
            }
        };

        let suffix_dn = ldap_core::dn::Dn::new(suffix.suffix.clone());
        let parent_dn = match &suffix.parent_suffix {
            Some(parent) => ldap_core::dn::Dn::new(parent.clone()),
            None => ldap_core::dn::Dn::new(""),
        };

        tree.add_node(&parent_dn, suffix_dn.clone(), state)
            .await
            .map_err(|err| Error::new(ErrorKind::InvalidInput, err.to_string()))?;

        for backend in &suffix.backend {
            tree.attach_backend(&suffix_dn, BackendSlot::new(backend.clone()))
                .await
                .map_err(|err| Error::new(ErrorKind::InvalidInput, err.to_string()))?;
        }

        info!("Mapped suffix {:?} ({}).", suffix.suffix, suffix.state);
    }

    Ok(tree)
}

fn build_backend(config: &LdapdConfig) -> std::io::Result<Arc<dyn Backend>> {
    match config.backend.kind.as_str() {
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => {
            error!("Unknown backend kind {:?}.", other);
            Err(Error::new(ErrorKind::InvalidInput, "unknown backend kind"))
        }
    }
}

/// Performs the operation for the `-h` flag, or the `--help`
/// GNU-style long flag in the daemon binary.
fn print_help_page() {
    println!(
        "Usage:    {} [options] ... [CONFIG_FILE]\n\
        \n\
        ldapd - LDAPv3 directory server core.\n\
        This binary will look for a configuration file (.toml)\n\
        in the current working directory as \"{}\".\n\
        \n\
        -h, --help          Print the help page.\n\
        -v, --version       Print build version & info.\n",
        BINARY, DEFAULT_TOML
    );
}

/// Performs the operation for the `-v` flag, or the `--version`
/// GNU-style long flag in the daemon binary.
#[rustfmt::skip]
fn print_version() {
    let bin_arch: &str = if cfg!(target_arch = "x86") { "x86" }
    else if cfg!(target_arch = "x86_64") { "x86_64" }
    else if cfg!(target_arch = "aarch64") { "aarch64" }
    else { "unknown" };

    let bin_platform: &str = if cfg!(target_os = "linux") { "linux" }
    else if cfg!(target_os = "windows") { "windows" }
    else if cfg!(target_os = "macos") { "macos" }
    else if cfg!(target_os = "freebsd") { "freebsd" }
    else { "unknown" };

    println!(
        "{}ldapd{}, version {} ({} {})\n\n\
        This program is free software; you can redistribute it and/or modify\n\
        it under the terms of the GNU Affero General Public License,\n\
        as published by the Free Software Foundation, either version 3\n\
        of the License, or (at your option) any later version.\n\n\
        This program is distributed in the hope that it will be useful,\n\
        but WITHOUT ANY WARRANTY; without even the implied warranty of\n\
        MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the\n\
        GNU Affero General Public License for more details.\n\n\
        The source code is publicly available at {}\n",
        logger::_ANSI_MAGENTA, logger::_ANSI_RESET,
        VERSION, bin_arch, bin_platform, GIT_URL
    );
}
