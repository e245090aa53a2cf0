// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local TCP port bookkeeping for debug-attach channels.

use std::{collections::BTreeSet, io};

/// The bottom of the IANA dynamic port range.
pub(crate) const DYNAMIC_PORT_MIN: u16 = 49152;
/// The top of the IANA dynamic port range, and of the port space.
pub(crate) const DYNAMIC_PORT_MAX: u16 = 65535;

/// A point-in-time snapshot of local TCP ports that are in use.
#[derive(Clone, Debug, Default)]
pub(crate) struct ActivePorts {
    ports: BTreeSet<u16>,
}

impl ActivePorts {
    pub(crate) fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    /// Snapshots the ports currently bound on this machine.
    ///
    /// On platforms without a procfs socket table the snapshot is empty;
    /// a collision there is caught by the attach handshake instead.
    pub(crate) fn snapshot() -> io::Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                Self::from_procfs()
            } else {
                Ok(Self::default())
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn from_procfs() -> io::Result<Self> {
        let mut ports = BTreeSet::new();
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            let text = match std::fs::read_to_string(table) {
                Ok(text) => text,
                // tcp6 is absent on kernels built without IPv6.
                Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error),
            };
            ports.extend(parse_proc_net_tcp(&text));
        }
        Ok(Self { ports })
    }
}

impl FromIterator<u16> for ActivePorts {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self {
            ports: iter.into_iter().collect(),
        }
    }
}

/// Extracts local port numbers from a `/proc/net/tcp` table.
///
/// Each data row carries the local endpoint in field 1 as
/// `hex-address:hex-port`. Rows that do not match are skipped.
fn parse_proc_net_tcp(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.lines().skip(1).filter_map(|line| {
        let local = line.split_whitespace().nth(1)?;
        let (_, port) = local.rsplit_once(':')?;
        u16::from_str_radix(port, 16).ok()
    })
}

/// Finds the first port in `start..=DYNAMIC_PORT_MAX` that is not in
/// `active`. The scan does not wrap below `start`.
pub(crate) fn scan_free_port(start: u16, active: &ActivePorts) -> Option<u16> {
    (start..=DYNAMIC_PORT_MAX).find(|&port| !active.contains(port))
}
