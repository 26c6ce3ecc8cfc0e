//! Target URL templating and log masking.

use crate::notify::PushPriority;

/// Values substituted into a channel target.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext<'a> {
    pub plate: &'a str,
    pub display_name: &'a str,
    pub icon: Option<&'a str>,
    pub priority: PushPriority,
}

/// Substitute `{icon}`, `{plate}`, `{display_name}`/`{displayName}`,
/// `{level}` and `{priority}` in `target`.
///
/// Without an icon the `icon={icon}` query parameter is removed entirely.
pub fn substitute(target: &str, ctx: &TargetContext<'_>) -> String {
    let mut url = match ctx.icon.filter(|icon| !icon.is_empty()) {
        Some(icon) => target.replace("{icon}", icon),
        None => target
            .replace("&icon={icon}", "")
            .replace("?icon={icon}&", "?")
            .replace("?icon={icon}", ""),
    };

    url = url
        .replace("{plate}", ctx.plate)
        .replace("{display_name}", ctx.display_name)
        .replace("{displayName}", ctx.display_name);

    url.replace("{level}", ctx.priority.bark_level())
        .replace("{priority}", ctx.priority.apprise_priority())
}

/// Mask the path of a target before logging it: `bark://host/abcd****wxyz`.
pub fn mask_target(target: &str) -> String {
    let Some((scheme, rest)) = target.split_once("://") else {
        return mask_segment(target);
    };

    match rest.split_once('/') {
        Some((host, path)) if !path.is_empty() => {
            format!("{scheme}://{host}/{}", mask_segment(path))
        }
        _ => format!("{scheme}://{}", mask_segment(rest)),
    }
}

fn mask_segment(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(icon: Option<&str>) -> TargetContext<'_> {
        TargetContext {
            plate: "京A12345",
            display_name: "家用车",
            icon,
            priority: PushPriority::High,
        }
    }

    #[test]
    fn test_substitutes_all_placeholders() {
        let url = substitute(
            "bark://api.day.app/KEY?group={plate}&title={displayName}&level={level}&icon={icon}",
            &ctx(Some("https://i.example/car.png")),
        );
        assert_eq!(
            url,
            "bark://api.day.app/KEY?group=京A12345&title=家用车&level=critical&icon=https://i.example/car.png"
        );
    }

    #[test]
    fn test_unset_icon_is_stripped() {
        assert_eq!(
            substitute("bark://h/KEY?level={level}&icon={icon}", &ctx(None)),
            "bark://h/KEY?level=critical"
        );
        assert_eq!(
            substitute("bark://h/KEY?icon={icon}&level={level}", &ctx(None)),
            "bark://h/KEY?level=critical"
        );
        assert_eq!(substitute("bark://h/KEY?icon={icon}", &ctx(None)), "bark://h/KEY");
    }

    #[test]
    fn test_priority_placeholder_uses_apprise_token() {
        assert_eq!(
            substitute("ntfy://topic?priority={priority}&name={display_name}", &ctx(None)),
            "ntfy://topic?priority=high&name=家用车"
        );
    }

    #[test]
    fn test_mask_target_hides_secrets() {
        assert_eq!(
            mask_target("bark://api.day.app/abcdefghijklmnop"),
            "bark://api.day.app/abcd****mnop"
        );
        assert_eq!(mask_target("tgram://short"), "tgram://****");
    }
}
