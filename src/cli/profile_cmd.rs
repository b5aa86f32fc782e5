use anyhow::Result;
use console::style;

use crate::core::error::ProfileError;
use crate::core::profiles::{Profile, ProfileStore};
use crate::core::terminal::{GuideSection, print_error, print_success};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ProfileAddArgs {
    pub name: Option<String>,
    pub server: Option<String>,
    pub api_key: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub make_default: bool,
}

pub(crate) fn parse_profile_add_args(args: &[String], start: usize) -> ProfileAddArgs {
    let mut parsed = ProfileAddArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--server" => {
                if i + 1 < args.len() {
                    parsed.server = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-key" => {
                if i + 1 < args.len() {
                    parsed.api_key = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--from" => {
                if i + 1 < args.len() {
                    parsed.from_address = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--from-name" => {
                if i + 1 < args.len() {
                    parsed.from_name = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--default" => {
                parsed.make_default = true;
                i += 1;
            }
            other => {
                if parsed.name.is_none() && !other.starts_with('-') {
                    parsed.name = Some(other.to_string());
                }
                i += 1;
            }
        }
    }
    parsed
}

fn print_profile_usage() {
    GuideSection::new("mailgoat profile")
        .command(
            "add <name> --server URL --api-key KEY",
            "Save a credential profile",
        )
        .text("    [--from <address>] [--from-name <name>] [--default]")
        .command("list", "List saved profiles")
        .command("use <name>", "Make a profile the default")
        .print();
    println!();
}

pub(crate) async fn run_profile_command(args: &[String]) -> Result<i32> {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
    let store = ProfileStore::open_default();

    match sub_cmd {
        "add" => {
            let parsed = parse_profile_add_args(args, 3);
            let (Some(name), Some(server), Some(api_key)) =
                (parsed.name, parsed.server, parsed.api_key)
            else {
                print_error("profile add requires <name>, --server, and --api-key");
                print_profile_usage();
                return Ok(1);
            };
            let profile = Profile {
                name: name.clone(),
                server,
                api_key,
                from_address: parsed.from_address,
                from_name: parsed.from_name,
            };
            store.add(&profile, parsed.make_default)?;
            let is_default = store.default_profile()?.as_deref() == Some(name.as_str());
            if is_default {
                print_success(&format!("Profile '{}' saved (default).", name));
            } else {
                print_success(&format!("Profile '{}' saved.", name));
            }
            Ok(0)
        }
        "list" | "ls" => {
            let profiles = store.list()?;
            if profiles.is_empty() {
                println!("  {} No profiles saved yet.", style("●").dim());
                return Ok(0);
            }
            let default = store.default_profile()?;
            println!();
            for profile in &profiles {
                let marker = if default.as_deref() == Some(profile.name.as_str()) {
                    format!("{}", style("(default)").cyan())
                } else {
                    String::new()
                };
                println!(
                    "  {} {} {} {}",
                    style("→").cyan(),
                    style(&profile.name).white().bold(),
                    style(&profile.server).dim(),
                    marker
                );
                if let Some(from) = &profile.from_address {
                    match &profile.from_name {
                        Some(from_name) => {
                            println!("      from: {} <{}>", from_name, from)
                        }
                        None => println!("      from: {}", from),
                    }
                }
            }
            println!();
            Ok(0)
        }
        "use" => {
            let Some(name) = args.get(3) else {
                print_error("profile use requires a profile name");
                print_profile_usage();
                return Ok(1);
            };
            match store.set_default(name) {
                Ok(()) => {
                    print_success(&format!("Profile '{}' is now the default.", name));
                    Ok(0)
                }
                Err(ProfileError::NotFound(name)) => {
                    print_error(&format!("profile not found: {}", name));
                    Ok(1)
                }
                Err(e) => Err(e.into()),
            }
        }
        _ => {
            print_error("Unknown or missing profile command. Expected: add, list, use");
            print_profile_usage();
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        let mut full = vec![
            "mailgoat".to_string(),
            "profile".to_string(),
            "add".to_string(),
        ];
        full.extend(list.iter().map(|s| s.to_string()));
        full
    }

    #[test]
    fn parse_profile_add_reads_name_and_flags() {
        let parsed = parse_profile_add_args(
            &args(&[
                "work",
                "--server",
                "https://mail.example.com",
                "--api-key",
                "secret",
                "--from",
                "team@example.com",
                "--from-name",
                "The Team",
                "--default",
            ]),
            3,
        );
        assert_eq!(parsed.name.as_deref(), Some("work"));
        assert_eq!(parsed.server.as_deref(), Some("https://mail.example.com"));
        assert_eq!(parsed.api_key.as_deref(), Some("secret"));
        assert_eq!(parsed.from_address.as_deref(), Some("team@example.com"));
        assert_eq!(parsed.from_name.as_deref(), Some("The Team"));
        assert!(parsed.make_default);
    }

    #[test]
    fn parse_profile_add_takes_first_positional_as_name() {
        let parsed = parse_profile_add_args(&args(&["alpha", "beta"]), 3);
        assert_eq!(parsed.name.as_deref(), Some("alpha"));
    }

    #[test]
    fn parse_profile_add_without_flags_leaves_options_empty() {
        let parsed = parse_profile_add_args(&args(&["solo"]), 3);
        assert_eq!(parsed.server, None);
        assert_eq!(parsed.api_key, None);
        assert!(!parsed.make_default);
    }
}
