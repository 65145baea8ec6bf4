//! Infrastructure implementation of the `ResourceStateReader` port.
//!
//! `AwsCliStateReader<R>` queries live resource state with read-only
//! `aws ... describe-*` calls routed through a `CommandRunner`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::application::ports::{CommandRunner, ResourceStateReader};
use crate::domain::{ReadError, ResourceAttributes, ResourceKind, ResourceRef, Scope};

/// How to describe one resource kind and where its fields live.
struct Query {
    service: &'static str,
    operation: &'static str,
    id_flag: &'static str,
    extra_args: &'static [&'static str],
    list_key: &'static str,
    status_key: Option<&'static str>,
    tags_key: &'static str,
    tag_key_field: &'static str,
    tag_value_field: &'static str,
    not_found: &'static [&'static str],
}

fn query(kind: ResourceKind) -> Query {
    match kind {
        ResourceKind::Vpc => Query {
            service: "ec2",
            operation: "describe-vpcs",
            id_flag: "--vpc-ids",
            extra_args: &[],
            list_key: "Vpcs",
            status_key: Some("State"),
            tags_key: "Tags",
            tag_key_field: "Key",
            tag_value_field: "Value",
            not_found: &["InvalidVpcID.NotFound"],
        },
        ResourceKind::Subnet => Query {
            service: "ec2",
            operation: "describe-subnets",
            id_flag: "--subnet-ids",
            extra_args: &[],
            list_key: "Subnets",
            status_key: Some("State"),
            tags_key: "Tags",
            tag_key_field: "Key",
            tag_value_field: "Value",
            not_found: &["InvalidSubnetID.NotFound"],
        },
        ResourceKind::SecurityGroup => Query {
            service: "ec2",
            operation: "describe-security-groups",
            id_flag: "--group-ids",
            extra_args: &[],
            list_key: "SecurityGroups",
            status_key: None,
            tags_key: "Tags",
            tag_key_field: "Key",
            tag_value_field: "Value",
            not_found: &["InvalidGroup.NotFound", "InvalidGroupId.Malformed"],
        },
        ResourceKind::DbInstance => Query {
            service: "rds",
            operation: "describe-db-instances",
            id_flag: "--db-instance-identifier",
            extra_args: &[],
            list_key: "DBInstances",
            status_key: Some("DBInstanceStatus"),
            tags_key: "TagList",
            tag_key_field: "Key",
            tag_value_field: "Value",
            not_found: &["DBInstanceNotFound"],
        },
        ResourceKind::EcsCluster => Query {
            service: "ecs",
            operation: "describe-clusters",
            id_flag: "--clusters",
            extra_args: &["--include", "TAGS"],
            list_key: "clusters",
            status_key: Some("status"),
            tags_key: "tags",
            tag_key_field: "key",
            tag_value_field: "value",
            not_found: &["ClusterNotFoundException"],
        },
    }
}

/// Infrastructure adapter for live resource state via the AWS CLI.
pub struct AwsCliStateReader<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> AwsCliStateReader<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ResourceStateReader for AwsCliStateReader<R> {
    async fn read(
        &self,
        resource: &ResourceRef,
        scope: &Scope,
    ) -> Result<ResourceAttributes, ReadError> {
        let q = query(resource.kind);
        let mut args = vec![
            q.service,
            q.operation,
            q.id_flag,
            resource.id.as_str(),
            "--region",
            scope.region.as_str(),
            "--output",
            "json",
        ];
        args.extend_from_slice(q.extra_args);
        if let Some(profile) = &scope.profile {
            args.extend(["--profile", profile.as_str()]);
        }

        let not_found = || ReadError::NotFound {
            kind: resource.kind.to_string(),
            id: resource.id.clone(),
            region: scope.region.clone(),
        };
        let failed = |message: String| ReadError::Failed {
            kind: resource.kind.to_string(),
            id: resource.id.clone(),
            message,
        };

        let output = self
            .runner
            .run("aws", &args)
            .await
            .map_err(|e| failed(format!("{e:#}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if q.not_found.iter().any(|marker| stderr.contains(marker)) {
                return Err(not_found());
            }
            return Err(failed(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_attributes(resource.kind, &resource.id, &stdout)
            .map_err(failed)?
            .ok_or_else(not_found)
    }
}

/// Parse a `describe-*` response for `kind`.
///
/// Returns `Ok(None)` when the response lists no matching resource (or an
/// ECS cluster that is `INACTIVE`, which is how ECS reports a deleted one).
///
/// # Errors
///
/// Returns a message if the response is not valid JSON.
pub fn parse_attributes(
    kind: ResourceKind,
    id: &str,
    json: &str,
) -> Result<Option<ResourceAttributes>, String> {
    let q = query(kind);
    let doc: Value = serde_json::from_str(json).map_err(|e| format!("invalid response JSON: {e}"))?;
    let Some(item) = doc
        .get(q.list_key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
    else {
        return Ok(None);
    };

    let status = q
        .status_key
        .and_then(|key| item.get(key))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    if kind == ResourceKind::EcsCluster && status.as_deref() == Some("INACTIVE") {
        return Ok(None);
    }

    let tags: BTreeMap<String, String> = item
        .get(q.tags_key)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| {
                    let key = tag.get(q.tag_key_field)?.as_str()?;
                    let value = tag.get(q.tag_value_field)?.as_str()?;
                    Some((key.to_string(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let attributes = item
        .iter()
        .filter(|(key, value)| {
            key.as_str() != q.tags_key
                && Some(key.as_str()) != q.status_key
                && !value.is_array()
                && !value.is_object()
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Some(ResourceAttributes {
        id: id.to_string(),
        status,
        tags,
        attributes,
    }))
}
