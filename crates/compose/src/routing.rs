use models::{
    GlobalConfig, PagerdutyConfig, Receiver, Route, RoutingConfig, RoutingDocument, Severity,
    SlackAction, SlackChannel, SlackConfig, TeamCredential,
};
use std::collections::BTreeMap;

/// File name under which the bundled notification templates are pushed.
pub const HELPER_TEMPLATE_NAME: &str = "helper.tmpl";
/// Runtime notification templates referenced by rendered Slack receivers.
pub const HELPER_TEMPLATE: &str = include_str!("helper.tmpl");

/// Receiver holding alerts for which no channel is configured.
const DEFAULT_RECEIVER: &str = "default";

// Alert grouping policy, applied at the routing-tree root.
const GROUP_BY: [&str; 5] = [
    "alertname",
    "severity",
    "owner",
    "service_name",
    "time_stamp",
];
const GROUP_WAIT: &str = "30s";
const GROUP_INTERVAL: &str = "5m";
const REPEAT_INTERVAL: &str = "4h";
const RESOLVE_TIMEOUT: &str = "5m";

// Paging is reserved for critical production incidents.
const PAGER_ENVIRONMENT: &str = "production";

/// Render the complete routing document of one tenant from its stored
/// team credentials.
///
/// Rendering is deterministic: teams order by name, and every team
/// carries the same three severity sub-routes whether or not each
/// credential is present. A route whose credential is missing falls back
/// to the default receiver, and no receiver is emitted for it.
pub fn routing_config(tenant: &str, credentials: &[TeamCredential]) -> RoutingDocument {
    let mut ordered: Vec<&TeamCredential> = credentials.iter().collect();
    ordered.sort_by(|a, b| a.team.cmp(&b.team));

    let mut receivers = vec![Receiver {
        name: DEFAULT_RECEIVER.to_string(),
        slack_configs: Vec::new(),
        pagerduty_configs: Vec::new(),
    }];
    let mut team_routes = Vec::new();

    for cred in ordered {
        let pagerduty = cred.pagerduty_key.as_ref().map(|key| {
            let name = format!("pagerduty-{}", cred.team);
            receivers.push(pagerduty_receiver(&name, key));
            name
        });
        let critical = cred.slack_critical.as_ref().map(|channel| {
            let name = format!("slack-critical-{}", cred.team);
            receivers.push(slack_receiver(&name, channel));
            name
        });
        let warning = cred.slack_warning.as_ref().map(|channel| {
            let name = format!("slack-warning-{}", cred.team);
            receivers.push(slack_receiver(&name, channel));
            name
        });

        // Sub-route order is load-bearing: the pager route continues into
        // the Slack routes, while Slack routes are terminal.
        team_routes.push(Route {
            match_: label_match(&[("team", &cred.team)]),
            routes: vec![
                pagerduty_route(pagerduty),
                severity_route(critical, Severity::Critical),
                severity_route(warning, Severity::Warning),
            ],
            ..Route::default()
        });
    }

    RoutingDocument {
        tenant: tenant.to_string(),
        config: RoutingConfig {
            templates: vec![HELPER_TEMPLATE_NAME.to_string()],
            global: GlobalConfig {
                resolve_timeout: RESOLVE_TIMEOUT.to_string(),
            },
            receivers,
            route: Route {
                receiver: Some(DEFAULT_RECEIVER.to_string()),
                group_by: GROUP_BY.iter().map(|l| l.to_string()).collect(),
                group_wait: Some(GROUP_WAIT.to_string()),
                group_interval: Some(GROUP_INTERVAL.to_string()),
                repeat_interval: Some(REPEAT_INTERVAL.to_string()),
                routes: team_routes,
                ..Route::default()
            },
        },
        template_files: [(HELPER_TEMPLATE_NAME.to_string(), HELPER_TEMPLATE.to_string())]
            .into_iter()
            .collect(),
    }
}

fn slack_receiver(name: &str, channel: &SlackChannel) -> Receiver {
    Receiver {
        name: name.to_string(),
        slack_configs: vec![SlackConfig {
            channel: channel.channel.clone(),
            api_url: channel.webhook.clone(),
            username: channel.username.clone(),
            icon_emoji: ":rotating_light:".to_string(),
            link_names: false,
            send_resolved: true,
            color: r#"{{ template "slack.color" . }}"#.to_string(),
            pretext: r#"{{ template "slack.pretext" . }}"#.to_string(),
            text: r#"{{ template "slack.body" . }}"#.to_string(),
            actions: vec![
                SlackAction {
                    type_: "button".to_string(),
                    text: "Runbook :green_book:".to_string(),
                    url: r#"{{ template "slack.runbook" . }}"#.to_string(),
                },
                SlackAction {
                    type_: "button".to_string(),
                    text: "Dashboard :bar_chart:".to_string(),
                    url: r#"{{ template "slack.dashboard" . }}"#.to_string(),
                },
            ],
        }],
        pagerduty_configs: Vec::new(),
    }
}

fn pagerduty_receiver(name: &str, service_key: &str) -> Receiver {
    Receiver {
        name: name.to_string(),
        slack_configs: Vec::new(),
        pagerduty_configs: vec![PagerdutyConfig {
            service_key: service_key.to_string(),
        }],
    }
}

fn pagerduty_route(receiver: Option<String>) -> Route {
    Route {
        receiver: Some(receiver.unwrap_or_else(|| DEFAULT_RECEIVER.to_string())),
        match_: label_match(&[
            ("environment", PAGER_ENVIRONMENT),
            ("severity", Severity::Critical.as_str()),
        ]),
        continue_: true,
        ..Route::default()
    }
}

fn severity_route(receiver: Option<String>, severity: Severity) -> Route {
    Route {
        receiver: Some(receiver.unwrap_or_else(|| DEFAULT_RECEIVER.to_string())),
        match_: label_match(&[("severity", severity.as_str())]),
        ..Route::default()
    }
}

fn label_match(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(label, value)| (label.to_string(), value.to_string()))
        .collect()
}
