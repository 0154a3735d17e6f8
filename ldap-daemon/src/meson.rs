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

//! Build/version constants for the CLI banner and default paths.

pub static BINARY: &str = "ldapd";
pub static VERSION: &str = env!("CARGO_PKG_VERSION");
pub static DEFAULT_TOML: &str = "ldapd.toml";
pub static GIT_URL: &str = env!("CARGO_PKG_REPOSITORY");
