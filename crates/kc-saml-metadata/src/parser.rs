//! Metadata document parsing.
//!
//! [`XmlMetadataParser`] turns SAML metadata XML into a [`MetadataTree`]. It
//! is the only place where element names are matched; everything downstream
//! works on the closed node, role and endpoint types of [`crate::model`].
//! Unknown extension elements are ignored.

use base64::Engine;
use chrono::{DateTime, Utc};
use roxmltree::Node;

use crate::constants::{MD_NS, XMLDSIG_NS};
use crate::error::{MetadataError, MetadataResult};
use crate::model::{
    ContactPerson, EndpointKind, Endpoint, EntitiesDescriptor, EntityDescriptor, KeyDescriptor,
    KeyInfo, KeyUsage, MetadataNode, MetadataTree, NodeId, Organization, RoleDescriptor, RoleKind,
    Signature,
};

/// Parses raw source bytes into a metadata tree.
pub trait MetadataParser: Send + Sync {
    /// Parses a complete metadata document.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed documents.
    fn parse(&self, bytes: &[u8]) -> MetadataResult<MetadataTree>;
}

/// Parser for SAML 2.0 metadata XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMetadataParser;

impl MetadataParser for XmlMetadataParser {
    fn parse(&self, bytes: &[u8]) -> MetadataResult<MetadataTree> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MetadataError::parse(format!("metadata is not UTF-8: {e}")))?;
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        if is_md(root, "EntitiesDescriptor") {
            let mut tree = MetadataTree::new(MetadataNode::Entities(parse_entities(root)?));
            let root_id = tree.root();
            append_members(&mut tree, root_id, root)?;
            Ok(tree)
        } else if is_md(root, "EntityDescriptor") {
            Ok(MetadataTree::new(MetadataNode::Entity(parse_entity(root)?)))
        } else {
            Err(MetadataError::parse(format!(
                "unexpected root element {{{}}}{}",
                root.tag_name().namespace().unwrap_or(""),
                root.tag_name().name()
            )))
        }
    }
}

// ============================================================================
// Element helpers
// ============================================================================

fn is_in(node: Node<'_, '_>, ns: &str, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == Some(ns)
}

fn is_md(node: Node<'_, '_>, local: &str) -> bool {
    is_in(node, MD_NS, local)
}

fn child<'a, 'input>(node: Node<'a, 'input>, ns: &str, local: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_in(*n, ns, local))
}

fn child_text(node: Node<'_, '_>, ns: &str, local: &str) -> Option<String> {
    child(node, ns, local)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn required_attr(node: Node<'_, '_>, name: &str) -> MetadataResult<String> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        MetadataError::parse(format!(
            "{} is missing required attribute {name}",
            node.tag_name().name()
        ))
    })
}

fn parse_instant(node: Node<'_, '_>, name: &str) -> MetadataResult<Option<DateTime<Utc>>> {
    node.attribute(name)
        .map(|value| {
            DateTime::parse_from_rfc3339(value.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| MetadataError::parse(format!("invalid {name} '{value}': {e}")))
        })
        .transpose()
}

fn decode_base64(text: &str) -> MetadataResult<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(cleaned)?)
}

fn certificates_under(node: Node<'_, '_>) -> MetadataResult<Vec<Vec<u8>>> {
    node.descendants()
        .filter(|n| is_in(*n, XMLDSIG_NS, "X509Certificate"))
        .filter_map(|n| n.text())
        .map(decode_base64)
        .collect()
}

// ============================================================================
// Descriptors
// ============================================================================

fn append_members(tree: &mut MetadataTree, parent: NodeId, element: Node<'_, '_>) -> MetadataResult<()> {
    for member in element.children().filter(Node::is_element) {
        if is_md(member, "EntitiesDescriptor") {
            let id = tree.add_child(parent, MetadataNode::Entities(parse_entities(member)?))?;
            append_members(tree, id, member)?;
        } else if is_md(member, "EntityDescriptor") {
            tree.add_child(parent, MetadataNode::Entity(parse_entity(member)?))?;
        }
    }
    Ok(())
}

fn parse_entities(element: Node<'_, '_>) -> MetadataResult<EntitiesDescriptor> {
    Ok(EntitiesDescriptor {
        name: element.attribute("Name").map(str::to_string),
        id: element.attribute("ID").map(str::to_string),
        valid_until: parse_instant(element, "validUntil")?,
        signature: parse_signature(element)?,
    })
}

fn parse_entity(element: Node<'_, '_>) -> MetadataResult<EntityDescriptor> {
    let entity_id = required_attr(element, "entityID")?;
    if entity_id.trim().is_empty() {
        return Err(MetadataError::parse("EntityDescriptor has an empty entityID"));
    }

    let mut entity = EntityDescriptor::new(entity_id);
    entity.id = element.attribute("ID").map(str::to_string);
    entity.valid_until = parse_instant(element, "validUntil")?;
    entity.signature = parse_signature(element)?;

    for part in element.children().filter(Node::is_element) {
        if part.tag_name().namespace() != Some(MD_NS) {
            continue;
        }
        if let Some(kind) = RoleKind::from_element_name(part.tag_name().name()) {
            entity.roles.push(parse_role(kind, part)?);
        } else if is_md(part, "Organization") {
            entity.organization = Some(Organization {
                name: child_text(part, MD_NS, "OrganizationName"),
                display_name: child_text(part, MD_NS, "OrganizationDisplayName"),
                url: child_text(part, MD_NS, "OrganizationURL"),
            });
        } else if is_md(part, "ContactPerson") {
            entity.contacts.push(ContactPerson {
                contact_type: part.attribute("contactType").unwrap_or("other").to_string(),
                given_name: child_text(part, MD_NS, "GivenName"),
                surname: child_text(part, MD_NS, "SurName"),
                emails: part
                    .children()
                    .filter(|n| is_md(*n, "EmailAddress"))
                    .filter_map(|n| n.text())
                    .map(|t| t.trim().to_string())
                    .collect(),
            });
        } else if is_md(part, "RoleDescriptor") {
            tracing::debug!(
                entity_id = %entity.entity_id,
                "Ignoring extension RoleDescriptor"
            );
        }
    }

    Ok(entity)
}

fn parse_role(kind: RoleKind, element: Node<'_, '_>) -> MetadataResult<RoleDescriptor> {
    let mut role = RoleDescriptor::new(kind);
    role.protocols = element
        .attribute("protocolSupportEnumeration")
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    for part in element.children().filter(Node::is_element) {
        if part.tag_name().namespace() != Some(MD_NS) {
            continue;
        }
        if let Some(endpoint_kind) = EndpointKind::from_element_name(part.tag_name().name()) {
            role.endpoints.push(parse_endpoint(endpoint_kind, part)?);
        } else if is_md(part, "KeyDescriptor") {
            let usage = match part.attribute("use") {
                Some("signing") => KeyUsage::Signing,
                Some("encryption") => KeyUsage::Encryption,
                None => KeyUsage::Unspecified,
                Some(other) => {
                    return Err(MetadataError::parse(format!("invalid KeyDescriptor use '{other}'")));
                }
            };
            role.keys.push(KeyDescriptor {
                usage,
                certificates: certificates_under(part)?,
            });
        } else if is_md(part, "NameIDFormat") {
            if let Some(format) = part.text().map(str::trim).filter(|t| !t.is_empty()) {
                role.name_id_formats.push(format.to_string());
            }
        }
    }

    Ok(role)
}

fn parse_endpoint(kind: EndpointKind, element: Node<'_, '_>) -> MetadataResult<Endpoint> {
    let mut endpoint = Endpoint::new(
        kind,
        required_attr(element, "Binding")?,
        required_attr(element, "Location")?,
    );
    endpoint.response_location = element.attribute("ResponseLocation").map(str::to_string);

    if let Some(index) = element.attribute("index") {
        endpoint.index = Some(
            index
                .trim()
                .parse()
                .map_err(|_| MetadataError::parse(format!("invalid endpoint index '{index}'")))?,
        );
    }
    endpoint.is_default = match element.attribute("isDefault") {
        Some("true" | "1") => Some(true),
        Some("false" | "0") => Some(false),
        Some(other) => {
            return Err(MetadataError::parse(format!("invalid isDefault '{other}'")));
        }
        None => None,
    };

    Ok(endpoint)
}

fn parse_signature(element: Node<'_, '_>) -> MetadataResult<Option<Signature>> {
    let Some(sig) = child(element, XMLDSIG_NS, "Signature") else {
        return Ok(None);
    };

    let signed_info = child(sig, XMLDSIG_NS, "SignedInfo")
        .ok_or_else(|| MetadataError::parse("Signature is missing SignedInfo"))?;
    let method = child(signed_info, XMLDSIG_NS, "SignatureMethod")
        .ok_or_else(|| MetadataError::parse("SignedInfo is missing SignatureMethod"))?;
    let algorithm = required_attr(method, "Algorithm")?;
    let reference = child(signed_info, XMLDSIG_NS, "Reference")
        .and_then(|r| r.attribute("URI"))
        .map(str::to_string);

    let value_text = child(sig, XMLDSIG_NS, "SignatureValue")
        .and_then(|n| n.text())
        .ok_or_else(|| MetadataError::parse("Signature is missing SignatureValue"))?;
    let value = decode_base64(value_text)?;

    let key_info = match child(sig, XMLDSIG_NS, "KeyInfo") {
        Some(info) => Some(KeyInfo {
            certificates: certificates_under(info)?,
        }),
        None => None,
    };

    Ok(Some(Signature {
        algorithm,
        value,
        reference,
        key_info,
    }))
}
