//! Built-in remediation routines for the containerised web stack.

use doctor_target::{ContainerOp, PathRepair};

use super::RemediationPlan;
use crate::config::RunContext;
use crate::domain::FixCategory;
use crate::op::TargetOp;

fn container(op: ContainerOp) -> TargetOp {
    TargetOp::Container(op)
}

fn restart(name: &str) -> TargetOp {
    container(ContainerOp::Restart {
        container: name.to_string(),
    })
}

fn ensure_network(ctx: &RunContext) -> TargetOp {
    TargetOp::EnsureNetwork {
        name: ctx.network_name.clone(),
    }
}

fn remove_network(ctx: &RunContext) -> TargetOp {
    container(ContainerOp::RemoveNetwork {
        name: ctx.network_name.clone(),
    })
}

fn write_proxy(ctx: &RunContext) -> TargetOp {
    TargetOp::WriteProxyConfig(ctx.proxy_params())
}

fn wait_for_app(ctx: &RunContext) -> TargetOp {
    TargetOp::WaitForHealth {
        url: ctx.app_health_url.clone(),
        marker: ctx.health_marker.clone(),
        policy: ctx.readiness,
    }
}

fn data_dirs(ctx: &RunContext) -> Vec<std::path::PathBuf> {
    vec![
        ctx.data_dir.clone(),
        ctx.templates_dir.clone(),
        ctx.ssl_dir.clone(),
    ]
}

fn init_db(ctx: &RunContext) -> TargetOp {
    container(ContainerOp::Exec {
        container: ctx.app_container.clone(),
        command: ctx.db_init_command.clone(),
    })
}

/// Guard `then` on `name` having been created by the deploy.
fn if_deployed(name: &str, then: Vec<TargetOp>, otherwise: Vec<TargetOp>) -> TargetOp {
    TargetOp::IfDeployed {
        container: name.to_string(),
        then,
        otherwise,
    }
}

/// Network: reuse → recreate → recreate with everything restarted.
pub fn network_plan(ctx: &RunContext) -> RemediationPlan {
    RemediationPlan {
        category: FixCategory::Network,
        primary: vec![
            ensure_network(ctx),
            if_deployed(&ctx.app_container, vec![restart(&ctx.app_container)], vec![]),
        ],
        alternate: vec![if_deployed(
            &ctx.app_container,
            vec![
                container(ContainerOp::Down {
                    remove_orphans: false,
                }),
                remove_network(ctx),
                ensure_network(ctx),
                container(ContainerOp::Up),
            ],
            vec![remove_network(ctx), ensure_network(ctx)],
        )],
        brute_force: vec![if_deployed(
            &ctx.app_container,
            vec![
                container(ContainerOp::Down {
                    remove_orphans: true,
                }),
                remove_network(ctx),
                ensure_network(ctx),
                container(ContainerOp::Up),
                restart(&ctx.app_container),
                restart(&ctx.proxy_container),
            ],
            vec![remove_network(ctx), ensure_network(ctx)],
        )],
    }
}

/// Permissions (and missing files): recreate + chmod → root chmod via helper
/// container → recursive world-writable chmod.
pub fn permissions_plan(ctx: &RunContext) -> RemediationPlan {
    let restart_app = || {
        if_deployed(
            &ctx.app_container,
            vec![restart(&ctx.app_container)],
            vec![],
        )
    };
    RemediationPlan {
        category: FixCategory::Permissions,
        primary: vec![
            TargetOp::PreparePaths(PathRepair {
                dirs: data_dirs(ctx),
                files: vec![ctx.db_path.clone()],
                mode: Some(0o775),
                ..Default::default()
            }),
            restart_app(),
        ],
        alternate: vec![
            container(ContainerOp::RunOnce {
                image: ctx.helper_image.clone(),
                mounts: vec![(ctx.data_dir.clone(), "/data".to_string())],
                command: vec![
                    "chmod".to_string(),
                    "-R".to_string(),
                    "a+rwX".to_string(),
                    "/data".to_string(),
                ],
            }),
            restart_app(),
        ],
        brute_force: vec![
            TargetOp::PreparePaths(PathRepair {
                dirs: data_dirs(ctx),
                files: vec![ctx.db_path.clone()],
                mode: Some(0o777),
                recursive: true,
                ..Default::default()
            }),
            restart_app(),
        ],
    }
}

/// Database: init in place → move the file aside and re-init → empty file
/// with open permissions. The existing database is never deleted.
pub fn database_plan(ctx: &RunContext) -> RemediationPlan {
    RemediationPlan {
        category: FixCategory::Database,
        primary: vec![if_deployed(
            &ctx.app_container,
            vec![init_db(ctx)],
            vec![TargetOp::PreparePaths(PathRepair {
                files: vec![ctx.db_path.clone()],
                mode: Some(0o664),
                ..Default::default()
            })],
        )],
        alternate: vec![
            TargetOp::PreparePaths(PathRepair {
                backup: vec![ctx.db_path.clone()],
                files: vec![ctx.db_path.clone()],
                mode: Some(0o666),
                ..Default::default()
            }),
            if_deployed(
                &ctx.app_container,
                vec![restart(&ctx.app_container), init_db(ctx)],
                vec![],
            ),
        ],
        brute_force: vec![
            TargetOp::PreparePaths(PathRepair {
                files: vec![ctx.db_path.clone()],
                mode: Some(0o666),
                ..Default::default()
            }),
            if_deployed(&ctx.app_container, vec![restart(&ctx.app_container)], vec![]),
        ],
    }
}

/// Reverse proxy: rewrite + reload → rewrite + restart → recreate the container.
pub fn nginx_plan(ctx: &RunContext) -> RemediationPlan {
    let proxy = &ctx.proxy_container;
    RemediationPlan {
        category: FixCategory::Nginx,
        primary: vec![
            write_proxy(ctx),
            if_deployed(
                proxy,
                vec![container(ContainerOp::Exec {
                    container: proxy.clone(),
                    command: vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()],
                })],
                vec![],
            ),
        ],
        alternate: vec![
            write_proxy(ctx),
            if_deployed(proxy, vec![restart(proxy)], vec![]),
        ],
        brute_force: vec![if_deployed(
            proxy,
            vec![
                container(ContainerOp::Remove {
                    container: proxy.clone(),
                }),
                write_proxy(ctx),
                container(ContainerOp::Up),
            ],
            vec![write_proxy(ctx)],
        )],
    }
}

/// Whole stack: redeploy → teardown and rebuild everything → every other
/// brute-force routine in turn.
pub fn comprehensive_plan(ctx: &RunContext) -> RemediationPlan {
    let brute_force = [
        network_plan(ctx),
        permissions_plan(ctx),
        database_plan(ctx),
        nginx_plan(ctx),
    ]
    .into_iter()
    .flat_map(|plan| plan.brute_force)
    .collect();

    RemediationPlan {
        category: FixCategory::Comprehensive,
        primary: vec![
            container(ContainerOp::Down {
                remove_orphans: false,
            }),
            ensure_network(ctx),
            write_proxy(ctx),
            container(ContainerOp::Build),
            container(ContainerOp::Up),
            wait_for_app(ctx),
        ],
        alternate: vec![
            container(ContainerOp::Down {
                remove_orphans: true,
            }),
            remove_network(ctx),
            ensure_network(ctx),
            TargetOp::PreparePaths(PathRepair {
                dirs: data_dirs(ctx),
                files: vec![ctx.db_path.clone()],
                mode: Some(0o775),
                ..Default::default()
            }),
            write_proxy(ctx),
            container(ContainerOp::Build),
            container(ContainerOp::Up),
            wait_for_app(ctx),
        ],
        brute_force,
    }
}

/// One plan per category.
pub fn standard_plans(ctx: &RunContext) -> Vec<RemediationPlan> {
    vec![
        network_plan(ctx),
        permissions_plan(ctx),
        database_plan(ctx),
        nginx_plan(ctx),
        comprehensive_plan(ctx),
    ]
}
