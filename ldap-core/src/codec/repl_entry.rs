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

//! Encoder/decoder for the replicated-entry BER payload: the wire format
//! shipped inside an `NSDS50ReplicationEntry` extended operation.
//!
//! ```text
//! Entry          ::= SEQUENCE { uniqueid OCTET STRING,
//!                                dn       OCTET STRING,
//!                                attrs    SEQUENCE OF Attribute }
//! Attribute      ::= SEQUENCE { type     OCTET STRING,
//!                                adcsn    [OPTIONAL] OCTET STRING,
//!                                deleted  [OPTIONAL] BOOLEAN,
//!                                values   SET OF AnnotatedValue }
//! AnnotatedValue ::= SEQUENCE { value    OCTET STRING,
//!                                deleted  [OPTIONAL] BOOLEAN,
//!                                csns     SEQUENCE OF AnnotatedCsn }
//! AnnotatedCsn   ::= SEQUENCE { csntype  ENUMERATED { updated(1),
//!                                                     deleted(2),
//!                                                     distinguished(3) },
//!                                value    OCTET STRING }
//! ```
//!
//! The attribute-deletion CSN carries no `CsnType` tag of its own — only
//! one can exist per attribute, so its presence is disambiguated by
//! peek-tag against the optional BOOLEAN/SET that would otherwise come
//! next. The per-attribute and per-value "deleted" booleans default to
//! `false` when absent.

use thiserror::Error;

use crate::attribute::Attribute;
use crate::codec::buffer::{self, BerError, BerWriter};
use crate::codec::reader::BerReader;
use crate::csn::{Csn, CsnType};
use crate::dn::Dn;
use crate::entry::{Entry, EntryFlags};
use crate::syntax::SyntaxRegistry;
use crate::uuid::{Uuid, UuidParseError};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum ReplEntryCodecError {
    #[error("BER error: {0}")]
    Ber(#[from] BerError),
    #[error("entry is missing its uniqueid")]
    MissingUniqueId,
    #[error("entry uniqueid is malformed: {0}")]
    BadUniqueId(#[from] UuidParseError),
    #[error("unknown CSN type tag {0}")]
    UnknownCsnType(u8),
    #[error("a CSN field on the wire was not valid")]
    BadCsn,
}

const TOMBSTONE_SENTINEL: &str = "nstombstone";

/// Encodes `entry` into a single BER buffer per the grammar above.
pub fn encode_entry(entry: &Entry) -> Result<Vec<u8>, ReplEntryCodecError> {
    let uniqueid = entry.uniqueid().ok_or(ReplEntryCodecError::MissingUniqueId)?;

    let mut body = BerWriter::new();
    body.write_octet_string(uniqueid.to_string().as_bytes())?;
    body.write_octet_string(entry.dn().ndn().as_bytes())?;

    let mut attrs_seq = BerWriter::new();
    for attr in entry.attrs() {
        attrs_seq.append(&encode_attribute(attr, false)?)?;
    }
    for attr in entry.deleted_attrs() {
        attrs_seq.append(&encode_attribute(attr, true)?)?;
    }
    body.write_constructed(buffer::TAG_SEQUENCE, &attrs_seq)?;

    let mut outer = BerWriter::new();
    outer.write_constructed(buffer::TAG_SEQUENCE, &body)?;
    Ok(outer.into_bytes())
}

fn encode_attribute(attr: &Attribute, attribute_deleted: bool) -> Result<BerWriter, ReplEntryCodecError> {
    let mut inner = BerWriter::new();
    inner.write_octet_string(attr.name().as_bytes())?;

    if let Some(csn) = attr.deletion_csn() {
        inner.write_octet_string(csn.to_string().as_bytes())?;
    }
    if attribute_deleted {
        inner.write_boolean(true)?;
    }

    let mut values_set = BerWriter::new();
    for value in attr.present().iter() {
        values_set.append(&encode_value(value, false)?)?;
    }
    for value in attr.deleted().iter() {
        values_set.append(&encode_value(value, true)?)?;
    }
    inner.write_constructed(buffer::TAG_SET, &values_set)?;

    let mut outer = BerWriter::new();
    outer.write_constructed(buffer::TAG_SEQUENCE, &inner)?;
    Ok(outer)
}

fn encode_value(value: &Value, deleted: bool) -> Result<BerWriter, ReplEntryCodecError> {
    let mut inner = BerWriter::new();
    inner.write_octet_string(value.bytes())?;
    if deleted {
        inner.write_boolean(true)?;
    }

    let mut csns_seq = BerWriter::new();
    for (kind, csn) in value.csns().without_attribute_deleted().iter() {
        csns_seq.append(&encode_csn(*kind, *csn)?)?;
    }
    inner.write_constructed(buffer::TAG_SEQUENCE, &csns_seq)?;

    let mut outer = BerWriter::new();
    outer.write_constructed(buffer::TAG_SEQUENCE, &inner)?;
    Ok(outer)
}

fn encode_csn(kind: CsnType, csn: Csn) -> Result<BerWriter, ReplEntryCodecError> {
    let tag = kind
        .wire_tag()
        .expect("encode_csn is never called with AttributeDeleted, which carries no tag");
    let mut body = BerWriter::new();
    body.write_enumerated(tag)?;
    body.write_octet_string(csn.to_string().as_bytes())?;
    let mut seq = BerWriter::new();
    seq.write_constructed(buffer::TAG_SEQUENCE, &body)?;
    Ok(seq)
}

/// Decodes a BER payload back into an [`Entry`]. On any malformed input
/// the whole payload is rejected and nothing is partially committed — the
/// `Entry` under construction is simply dropped.
pub fn decode_entry(data: &[u8], registry: &SyntaxRegistry) -> Result<Entry, ReplEntryCodecError> {
    let mut top = BerReader::new(data);
    let mut body = top.read_constructed(buffer::TAG_SEQUENCE)?;

    let uniqueid_bytes = body.read_octet_string()?;
    let uniqueid = Uuid::parse(&String::from_utf8_lossy(uniqueid_bytes))?;

    let dn_bytes = body.read_octet_string()?;
    let dn = Dn::new(String::from_utf8_lossy(dn_bytes).into_owned());

    let mut entry = Entry::new(dn);
    entry.set_uniqueid(uniqueid);

    let mut attrs_seq = body.read_constructed(buffer::TAG_SEQUENCE)?;

    while !attrs_seq.is_empty() {
        let (attr, attribute_deleted) = decode_attribute(&mut attrs_seq, registry)?;
        if attribute_deleted {
            entry.add_deleted_attribute(attr);
        } else {
            entry.add_present_attribute(attr);
        }
    }

    if let Some(oc) = entry.attr_find("objectClass") {
        let is_subentry = oc.present().iter().any(|v| v.bytes().eq_ignore_ascii_case(b"ldapsubentry"));
        if is_subentry {
            entry.set_flag(EntryFlags::SUBENTRY);
        }
    }
    if entry.rdn().ndn().contains(TOMBSTONE_SENTINEL) {
        entry.set_flag(EntryFlags::TOMBSTONE);
    }

    Ok(entry)
}

fn peeked(reader: &BerReader<'_>, tag: u8) -> bool {
    matches!(reader.peek_tag(), Ok(t) if t == tag)
}

fn decode_attribute(seq: &mut BerReader<'_>, registry: &SyntaxRegistry) -> Result<(Attribute, bool), ReplEntryCodecError> {
    let mut attr_seq = seq.read_constructed(buffer::TAG_SEQUENCE)?;

    let name = String::from_utf8_lossy(attr_seq.read_octet_string()?).into_owned();

    let mut deletion_csn = None;
    if peeked(&attr_seq, buffer::TAG_OCTET_STRING) {
        let csn_bytes = attr_seq.read_octet_string()?;
        let csn = Csn::parse(&String::from_utf8_lossy(csn_bytes)).map_err(|_| ReplEntryCodecError::BadCsn)?;
        deletion_csn = Some(csn);
    }

    let mut attribute_deleted = false;
    if peeked(&attr_seq, buffer::TAG_BOOLEAN) {
        attribute_deleted = attr_seq.read_boolean()?;
    }

    let descriptor = registry.lookup_with_default(&name);
    let mut attr = Attribute::new(name, descriptor.equality.clone());
    if let Some(csn) = deletion_csn {
        attr.set_deletion_csn(csn);
    }

    let mut values_set = attr_seq.read_constructed(buffer::TAG_SET)?;

    while !values_set.is_empty() {
        let (value, deleted) = decode_value(&mut values_set)?;
        if deleted {
            attr.add_deleted(value);
        } else {
            attr.add_present(value);
        }
    }

    Ok((attr, attribute_deleted))
}

fn decode_value(seq: &mut BerReader<'_>) -> Result<(Value, bool), ReplEntryCodecError> {
    let mut value_seq = seq.read_constructed(buffer::TAG_SEQUENCE)?;

    let bytes = value_seq.read_octet_string()?;

    let mut deleted = false;
    if peeked(&value_seq, buffer::TAG_BOOLEAN) {
        deleted = value_seq.read_boolean()?;
    }

    let mut value = Value::new(bytes);
    let mut csns_seq = value_seq.read_constructed(buffer::TAG_SEQUENCE)?;

    while !csns_seq.is_empty() {
        let mut csn_seq = csns_seq.read_constructed(buffer::TAG_SEQUENCE)?;
        let tag = csn_seq.read_enumerated()?;
        let kind = CsnType::from_wire_tag(tag).ok_or(ReplEntryCodecError::UnknownCsnType(tag))?;
        let csn_bytes = csn_seq.read_octet_string()?;
        let csn = Csn::parse(&String::from_utf8_lossy(csn_bytes)).map_err(|_| ReplEntryCodecError::BadCsn)?;
        value.csns_mut().insert(kind, csn);
    }

    Ok((value, deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_rule::case_ignore;

    fn sample_entry() -> Entry {
        let mut entry = Entry::new(Dn::new("cn=alice,ou=people,o=x"));
        entry.set_uniqueid(Uuid::parse("11111111-1111-1111-1111-111111111111").unwrap());

        let mut cn = Attribute::new("cn", case_ignore());
        let mut v = Value::new(*b"alice");
        v.csns_mut().insert(CsnType::ValueUpdated, Csn::new(1, 0, 1, 0));
        cn.add_present(v);
        entry.add_present_attribute(cn);

        entry
    }

    #[test]
    fn round_trips_a_simple_entry() {
        let entry = sample_entry();
        let registry = SyntaxRegistry::new();

        let wire = encode_entry(&entry).unwrap();
        let decoded = decode_entry(&wire, &registry).unwrap();

        assert_eq!(decoded.dn().ndn(), entry.dn().ndn());
        assert_eq!(decoded.uniqueid(), entry.uniqueid());
        let attr = decoded.attr_find("cn").unwrap();
        assert_eq!(attr.present().len(), 1);
        assert_eq!(attr.present().get(0).unwrap().bytes(), b"alice");
    }

    #[test]
    fn round_trips_attribute_and_value_deletion_markers() {
        let mut entry = Entry::new(Dn::new("cn=bob,o=x"));
        entry.set_uniqueid(Uuid::parse("22222222-2222-2222-2222-222222222222").unwrap());

        let mut sn = Attribute::new("sn", case_ignore());
        sn.set_deletion_csn(Csn::new(9, 0, 1, 0));
        let mut deleted_value = Value::new(*b"obsolete");
        deleted_value.csns_mut().insert(CsnType::ValueDeleted, Csn::new(9, 0, 1, 0));
        sn.add_deleted(deleted_value);
        entry.add_deleted_attribute(sn);

        let registry = SyntaxRegistry::new();
        let wire = encode_entry(&entry).unwrap();
        let decoded = decode_entry(&wire, &registry).unwrap();

        let attr = decoded.deleted_attrs().iter().find(|a| a.name() == "sn").unwrap();
        assert_eq!(attr.deletion_csn(), Some(Csn::new(9, 0, 1, 0)));
        assert_eq!(attr.deleted().len(), 1);
    }

    #[test]
    fn present_attribute_with_a_deletion_csn_stays_present_after_round_trip() {
        let mut entry = Entry::new(Dn::new("cn=carol,o=x"));
        entry.set_uniqueid(Uuid::parse("55555555-5555-5555-5555-555555555555").unwrap());

        let mut sn = Attribute::new("sn", case_ignore());
        sn.set_deletion_csn(Csn::new(9, 0, 1, 0));
        let mut v = Value::new(*b"carol");
        v.csns_mut().insert(CsnType::ValueUpdated, Csn::new(10, 0, 1, 0));
        sn.add_present(v);
        entry.add_present_attribute(sn);

        let registry = SyntaxRegistry::new();
        let wire = encode_entry(&entry).unwrap();
        let decoded = decode_entry(&wire, &registry).unwrap();

        assert!(decoded.deleted_attrs().iter().find(|a| a.name() == "sn").is_none());
        let attr = decoded.attr_find("sn").unwrap();
        assert_eq!(attr.deletion_csn(), Some(Csn::new(9, 0, 1, 0)));
        assert_eq!(attr.present().len(), 1);
    }

    #[test]
    fn missing_uniqueid_is_rejected_before_encoding() {
        let entry = Entry::new(Dn::new("o=x"));
        assert!(matches!(encode_entry(&entry), Err(ReplEntryCodecError::MissingUniqueId)));
    }

    #[test]
    fn truncated_payload_is_rejected_without_panicking() {
        let registry = SyntaxRegistry::new();
        let entry = sample_entry();
        let mut wire = encode_entry(&entry).unwrap();
        wire.truncate(wire.len() - 2);
        assert!(decode_entry(&wire, &registry).is_err());
    }

    #[test]
    fn ldapsubentry_object_class_sets_the_subentry_flag() {
        let mut entry = Entry::new(Dn::new("cn=policy,o=x"));
        entry.set_uniqueid(Uuid::parse("44444444-4444-4444-4444-444444444444").unwrap());

        let mut oc = Attribute::new("objectClass", case_ignore());
        oc.add_present(Value::new(*b"ldapsubentry"));
        entry.add_present_attribute(oc);

        let registry = SyntaxRegistry::new();
        let wire = encode_entry(&entry).unwrap();
        let decoded = decode_entry(&wire, &registry).unwrap();

        assert!(decoded.has_flag(EntryFlags::SUBENTRY));
        assert!(!decoded.has_flag(EntryFlags::GLUE));
    }

    #[test]
    fn tombstone_rdn_sets_the_tombstone_flag() {
        let mut entry = Entry::new(Dn::new("nsuniqueid=abc+cn=nsTombstone,o=x"));
        entry.set_uniqueid(Uuid::parse("33333333-3333-3333-3333-333333333333").unwrap());
        let registry = SyntaxRegistry::new();

        let wire = encode_entry(&entry).unwrap();
        let decoded = decode_entry(&wire, &registry).unwrap();
        assert!(decoded.has_flag(EntryFlags::TOMBSTONE));
    }
}
