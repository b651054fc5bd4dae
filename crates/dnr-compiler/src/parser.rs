use dnr_core::rule::{BlockRule, InitiatorScope, ResourceType, RuleAction, RuleCondition};

/// Compiles filter list text into block rules.
///
/// Lines are processed in order, one pass, no reordering or deduplication.
/// Only domain-anchor filters (`||domain^`) translate; comments, section
/// headers and unsupported syntax are skipped without consuming an id, so
/// identical input always yields the identical rule sequence.
pub fn compile(text: &str) -> Vec<BlockRule> {
    let mut rules = Vec::new();
    let mut next_id = 1u32;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        let (filter_part, options_part) = split_rule_options(line);

        let domain = match parse_domain_anchor(filter_part) {
            Some(domain) => domain,
            None => {
                log::debug!("skipping unsupported filter line: {line}");
                continue;
            }
        };

        let initiator_scope = options_part.and_then(parse_options);

        rules.push(BlockRule {
            id: next_id,
            priority: 1,
            action: RuleAction::Block,
            condition: RuleCondition {
                url_filter: format!("||{domain}/"),
                resource_types: ResourceType::all(),
                initiator_scope,
            },
        });
        next_id += 1;
    }

    log::debug!("compiled {} rules", rules.len());
    rules
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Extracts the host from a `||domain^` filter.
///
/// Wildcarded domains are rejected: the anchor-only translation has no way
/// to express them in a plain `urlFilter`.
fn parse_domain_anchor(filter: &str) -> Option<&str> {
    let domain = filter.strip_prefix("||")?.strip_suffix('^')?;
    if domain.is_empty() || domain.contains('*') {
        return None;
    }
    Some(domain)
}

fn parse_options(text: &str) -> Option<InitiatorScope> {
    let mut scope = None;

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some(value) = raw.strip_prefix("domain=") {
            // Last domain= option on the line wins; an option with no valid
            // tokens leaves any earlier scope in place.
            if let Some(parsed) = parse_domain_option(value) {
                scope = Some(parsed);
            }
        } else {
            log::debug!("ignoring unsupported filter option: {raw}");
        }
    }

    scope
}

/// Parses a `domain=` option value into an initiator scope.
///
/// Exclusion wins: if any `~domain` token is present, the scope excludes
/// those domains and any inclusion tokens on the same option are dropped.
/// The engine cannot combine both on one rule.
fn parse_domain_option(value: &str) -> Option<InitiatorScope> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in value.split('|') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }

        match token.strip_prefix('~') {
            Some(domain) if !domain.is_empty() => exclude.push(domain.to_string()),
            Some(_) => {}
            None => include.push(token.to_string()),
        }
    }

    if !exclude.is_empty() {
        if !include.is_empty() {
            log::debug!(
                "dropping {} inclusion domains in favor of {} exclusions",
                include.len(),
                exclude.len()
            );
        }
        Some(InitiatorScope::ExcludedInitiatorDomains(exclude))
    } else if !include.is_empty() {
        Some(InitiatorScope::InitiatorDomains(include))
    } else {
        None
    }
}
