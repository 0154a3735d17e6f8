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

//! Core directory-entry data model, attribute-syntax/matching-rule
//! registry, and BER wire codec shared by the rest of the workspace.

pub mod attribute;
pub mod codec;
pub mod csn;
pub mod dn;
pub mod entry;
pub mod matching_rule;
pub mod result_code;
pub mod syntax;
pub mod uuid;
pub mod value;
