// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ingress access list on the interface of the requester

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use config::{
    Acl, AclAction, AclInterfaces, AclRule, ConfigError, DataplaneConfig, IcmpMatch, IpMatch,
    IpProtocol, PortMatch, PortRange,
};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

const ACTION: &str = "action";
const DST_NET: &str = "dstnet";
const SRC_NET: &str = "srcnet";
const ICMP_TYPE: &str = "icmptype";
const TCP_LOW_PORT: &str = "tcplowport";
const TCP_UP_PORT: &str = "tcpupport";
const UDP_LOW_PORT: &str = "udplowport";
const UDP_UP_PORT: &str = "udpupport";

/// Why a rule could not be parsed. Each variant carries the rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AclRuleError {
    #[error("Rule '{0}' should have 'action' set")]
    MissingAction(String),
    #[error("Rule '{0}': invalid action '{1}'")]
    InvalidAction(String, String),
    #[error("Rule '{0}': invalid {1} '{2}'")]
    InvalidNumber(String, &'static str, String),
    #[error("Rule '{0}': {1}")]
    Invalid(String, ConfigError),
}

// "k1=v1, k2=v2"; pairs without exactly one '=' count as an empty key
fn parse_kv(rule: &str) -> HashMap<&str, &str> {
    rule.split(',')
        .map(|pair| match pair.split('=').collect::<Vec<_>>().as_slice() {
            [k, v] => (k.trim(), v.trim()),
            _ => ("", ""),
        })
        .collect()
}

fn parse_action(rule: &str, action: &str) -> Result<AclAction, AclRuleError> {
    match action.to_ascii_lowercase().as_str() {
        "deny" => Ok(AclAction::Deny),
        "permit" => Ok(AclAction::Permit),
        "reflect" => Ok(AclAction::Reflect),
        _ => Err(AclRuleError::InvalidAction(
            rule.to_owned(),
            action.to_owned(),
        )),
    }
}

fn number<T: std::str::FromStr>(
    rule: &str,
    kv: &HashMap<&str, &str>,
    key: &'static str,
) -> Result<Option<T>, AclRuleError> {
    kv.get(key)
        .map(|value| {
            value.parse().map_err(|_| {
                AclRuleError::InvalidNumber(rule.to_owned(), key, (*value).to_owned())
            })
        })
        .transpose()
}

// both bounds are needed for a port match
fn ports(
    rule: &str,
    kv: &HashMap<&str, &str>,
    low: &'static str,
    up: &'static str,
) -> Result<Option<PortMatch>, AclRuleError> {
    let lower = number(rule, kv, low)?;
    let upper = number(rule, kv, up)?;
    Ok(lower.zip(upper).map(|(lower, upper)| PortMatch {
        source: PortRange::ANY,
        destination: PortRange { lower, upper },
    }))
}

fn parse_rule(rule: &str) -> Result<AclRule, AclRuleError> {
    let kv = parse_kv(rule);
    let action = kv
        .get(ACTION)
        .ok_or_else(|| AclRuleError::MissingAction(rule.to_owned()))?;
    let action = parse_action(rule, action)?;

    let src = kv.get(SRC_NET).copied();
    let dst = kv.get(DST_NET).copied();
    let ip = (src.is_some() || dst.is_some()).then(|| IpMatch {
        source_network: src.unwrap_or_default().to_owned(),
        destination_network: dst.unwrap_or_default().to_owned(),
    });

    let mut protocols = vec![];
    if let Some(icmp_type) = number(rule, &kv, ICMP_TYPE)? {
        protocols.push(IpProtocol::Icmp(IcmpMatch {
            icmpv6: false,
            icmp_type,
        }));
    }
    if let Some(tcp) = ports(rule, &kv, TCP_LOW_PORT, TCP_UP_PORT)? {
        protocols.push(IpProtocol::Tcp(tcp));
    }
    if let Some(udp) = ports(rule, &kv, UDP_LOW_PORT, UDP_UP_PORT)? {
        protocols.push(IpProtocol::Udp(udp));
    }

    let parsed = AclRule {
        action,
        ip,
        protocols,
    };
    parsed
        .validate()
        .map_err(|e| AclRuleError::Invalid(rule.to_owned(), e))?;
    Ok(parsed)
}

/// Parse access list rules given as `key=value` lists, e.g.
/// `action=permit, dstnet=10.0.0.0/24, tcplowport=80, tcpupport=8080`.
///
/// Keys are `action` (mandatory: deny, permit or reflect), `srcnet` and `dstnet` (CIDR),
/// `icmptype`, `tcplowport`/`tcpupport` and `udplowport`/`udpupport`. A port range is only
/// matched on when both of its bounds are given. Rules come out in the order of their names.
pub fn parse_acl_rules(rules: &BTreeMap<String, String>) -> Result<Vec<AclRule>, AclRuleError> {
    rules.values().map(|rule| parse_rule(rule)).collect()
}

/// Appends an ingress access list on the last vpp interface
pub struct AclServer {
    rules: Vec<AclRule>,
}

impl AclServer {
    #[must_use]
    pub fn new(rules: Vec<AclRule>) -> Self {
        Self { rules }
    }

    fn append(&self, scope: &mut CallScope) {
        let Some(config) = scope.config_mut() else {
            return;
        };
        self.append_acl(config);
    }

    fn append_acl(&self, config: &mut DataplaneConfig) {
        let Some(iface) = config.vpp.last_interface().map(|i| i.name.clone()) else {
            return;
        };
        debug!("{} acl rules on {iface}", self.rules.len());
        config.vpp.acls.push(Acl {
            name: format!("ingress-acl-{iface}"),
            rules: self.rules.clone(),
            interfaces: AclInterfaces {
                ingress: vec![iface],
                egress: vec![],
            },
        });
    }
}

#[async_trait]
impl ChainElement for AclServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.append(scope);
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.append(scope);
        next.close(scope, conn).await
    }
}
