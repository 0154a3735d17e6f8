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

use serde::Deserialize;

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct LdapdConfig {
    pub daemon: Daemon,
    pub mapping_tree: MappingTree,
    pub sync: Sync,
    pub backend: Backend,
}

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct Daemon {
    pub name: String,
    pub bind: String, // '<host>:<port>'
    pub log_level: Option<String>,
}

#[derive(Deserialize, PartialEq, Debug, Clone, Default)]
pub struct MappingTree {
    #[serde(default)]
    pub suffix: Vec<SuffixEntry>,
}

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct SuffixEntry {
    pub suffix: String,
    pub parent_suffix: Option<String>,
    /// One of `disabled`, `backend`, `referral`, `referral-on-update`, `container`.
    pub state: String,
    #[serde(default)]
    pub backend: Vec<String>,
    #[serde(default)]
    pub referral: Vec<String>,
}

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct Sync {
    pub max_persist_sessions: usize,
    pub idle_timeout_secs: u64,
}

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct Backend {
    pub kind: String,
    pub connection_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_configuration() {
        let toml = r#"
            [daemon]
            name = "ldapd"
            bind = "0.0.0.0:389"

            [mapping_tree]
            [[mapping_tree.suffix]]
            suffix = "o=example"
            state = "backend"
            backend = ["db1"]

            [sync]
            max_persist_sessions = 64
            idle_timeout_secs = 300

            [backend]
            kind = "memory"
        "#;

        let conf: LdapdConfig = toml::from_str(toml).unwrap();
        assert_eq!(conf.daemon.name, "ldapd");
        assert_eq!(conf.mapping_tree.suffix.len(), 1);
        assert_eq!(conf.mapping_tree.suffix[0].suffix, "o=example");
        assert_eq!(conf.sync.max_persist_sessions, 64);
        assert_eq!(conf.backend.kind, "memory");
    }
}
