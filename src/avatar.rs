use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Profile;

pub const PICTURES_ROOT: &str = "/Assets/ProfilePictures";
pub const DEFAULT_PICTURE: &str = "Default1.png";

const CURATED: &[(&str, &str)] = &[
    ("Fanny", "Fanny.png"),
    ("Yharim", "Yharim.png"),
    ("XB10", "NotFabsol.png"),
    ("Hypnos", "Default1.png"),
];

const DEFAULT_POOL: &[&str] = &["Default1.png", "Default2.png", "Default3.png"];

static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+([0-9]+)$").unwrap());

/// Picks the profile picture for a poster. Total and deterministic.
pub fn resolve(poster_id: &str, profile: Option<&Profile>) -> String {
    if let Some(file) = profile.and_then(|profile| curated(&profile.name)) {
        return picture(file);
    }

    let base = poster_id.rsplit('/').next().unwrap_or(poster_id);
    if let Some(file) = curated(base) {
        return picture(file);
    }

    if let Some(number) = member_number(base) {
        let slot = ((number - 1) % DEFAULT_POOL.len() as u64) as usize;
        return picture(DEFAULT_POOL[slot]);
    }

    picture(DEFAULT_PICTURE)
}

fn curated(name: &str) -> Option<&'static str> {
    CURATED
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, file)| *file)
}

fn member_number(base: &str) -> Option<u64> {
    let captures = NUMBERED.captures(base)?;
    let number = captures.get(1)?.as_str().parse::<u64>().ok()?;
    (number >= 1).then_some(number)
}

fn picture(file: &str) -> String {
    format!("{PICTURES_ROOT}/{file}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_name_takes_precedence() {
        let profile = Profile {
            name: "XB10".into(),
            ..Profile::default()
        };
        assert_eq!(
            resolve("Someone", Some(&profile)),
            "/Assets/ProfilePictures/NotFabsol.png"
        );
    }

    #[test]
    fn nested_identifier_uses_last_segment() {
        assert_eq!(resolve("Friends/Yharim", None), "/Assets/ProfilePictures/Yharim.png");
    }

    #[test]
    fn numbered_members_cycle_through_pool() {
        assert_eq!(resolve("Believers/Believer1", None), "/Assets/ProfilePictures/Default1.png");
        assert_eq!(resolve("Believers/Believer2", None), "/Assets/ProfilePictures/Default2.png");
        assert_eq!(resolve("Believers/Believer3", None), "/Assets/ProfilePictures/Default3.png");
        assert_eq!(resolve("Believers/Believer4", None), "/Assets/ProfilePictures/Default1.png");
    }

    #[test]
    fn unknown_and_zero_fall_back_to_default() {
        assert_eq!(resolve("Stranger", None), "/Assets/ProfilePictures/Default1.png");
        assert_eq!(resolve("Member0", None), "/Assets/ProfilePictures/Default1.png");
        assert_eq!(resolve("", None), "/Assets/ProfilePictures/Default1.png");
    }

    #[test]
    fn repeated_calls_agree() {
        let profile = Profile {
            name: "Believer5".into(),
            ..Profile::default()
        };
        let first = resolve("Believers/Believer5", Some(&profile));
        assert_eq!(first, resolve("Believers/Believer5", Some(&profile)));
        assert_eq!(first, "/Assets/ProfilePictures/Default2.png");
    }
}
