//! Command-line parsing and dispatch
//!
//! Arguments are parsed by hand: `--config PATH` may appear anywhere, the
//! first remaining word is the command and the rest are its positionals.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Value, json};
use travel_api::models::UserCredentials;
use travel_api::{MediaUpload, TravelApi};

use crate::error::{Error, Result};

pub const USAGE: &str = "\
usage: globes [--config PATH] <command> [args]

session:
  login <email> <password>      log in and store the session
  register <email> <password>   create an account
  logout                        end the session
  whoami                        show the logged-in user

profiles:
  profile <user-id>             show a profile
  followers <profile-id>        list followers
  following <profile-id>        list followed profiles
  follow <user-id>              follow a user
  unfollow <user-id>            stop following a user
  search-profiles <query>       search profiles by username

trips:
  trips [user-id]               your trips, or another user's
  public-trips                  public trips
  following-trips               trips of people you follow
  trip-media <trip-id>          media attached to a trip
  upload <trip-id> <file>       upload a photo or video to a trip

globes:
  globes [user-id]              your globes, or another user's
  public-globes                 public globes

likes:
  likes <trip-id>               like count for a trip
  like <trip-id>                like a trip
  unlike <trip-id>              remove your like";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Login { email: String, password: String },
    Register { email: String, password: String },
    Logout,
    Whoami,
    Profile { user_id: String },
    Followers { profile_id: String },
    Following { profile_id: String },
    Follow { user_id: String },
    Unfollow { user_id: String },
    SearchProfiles { query: String },
    Trips { user_id: Option<String> },
    PublicTrips,
    FollowingTrips,
    TripMedia { trip_id: String },
    Upload { trip_id: String, path: PathBuf },
    Globes { user_id: Option<String> },
    PublicGlobes,
    Likes { trip_id: String },
    Like { trip_id: String },
    Unlike { trip_id: String },
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

/// Positional arguments of one command.
struct Args<'a> {
    command: &'a str,
    values: std::slice::Iter<'a, &'a str>,
}

impl Args<'_> {
    fn required(&mut self, argument: &'static str) -> Result<String> {
        self.values
            .next()
            .map(|v| v.to_string())
            .ok_or_else(|| Error::MissingArgument {
                command: self.command.to_string(),
                argument,
            })
    }

    fn optional(&mut self) -> Option<String> {
        self.values.next().map(|v| v.to_string())
    }

    /// Everything left, joined with spaces.
    fn rest(&mut self, argument: &'static str) -> Result<String> {
        let words: Vec<&str> = self.values.by_ref().copied().collect();
        if words.is_empty() {
            return Err(Error::MissingArgument {
                command: self.command.to_string(),
                argument,
            });
        }
        Ok(words.join(" "))
    }

    fn finish(mut self) -> Result<()> {
        match self.values.next() {
            Some(extra) => Err(Error::UnexpectedArgument {
                command: self.command.to_string(),
                argument: extra.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Parse arguments (without the program name).
pub fn parse(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut words: Vec<&str> = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config_path = Some(iter.next().ok_or(Error::MissingConfigPath)?.clone());
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = Some(path.to_string());
        } else {
            words.push(arg);
        }
    }

    let Some((name, positionals)) = words.split_first() else {
        return Err(Error::MissingCommand);
    };
    let mut a = Args {
        command: *name,
        values: positionals.iter(),
    };

    let command = match *name {
        "help" | "--help" | "-h" => Command::Help,
        "login" => Command::Login {
            email: a.required("email")?,
            password: a.required("password")?,
        },
        "register" => Command::Register {
            email: a.required("email")?,
            password: a.required("password")?,
        },
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "profile" => Command::Profile {
            user_id: a.required("user-id")?,
        },
        "followers" => Command::Followers {
            profile_id: a.required("profile-id")?,
        },
        "following" => Command::Following {
            profile_id: a.required("profile-id")?,
        },
        "follow" => Command::Follow {
            user_id: a.required("user-id")?,
        },
        "unfollow" => Command::Unfollow {
            user_id: a.required("user-id")?,
        },
        "search-profiles" => Command::SearchProfiles {
            query: a.rest("query")?,
        },
        "trips" => Command::Trips {
            user_id: a.optional(),
        },
        "public-trips" => Command::PublicTrips,
        "following-trips" => Command::FollowingTrips,
        "trip-media" => Command::TripMedia {
            trip_id: a.required("trip-id")?,
        },
        "upload" => Command::Upload {
            trip_id: a.required("trip-id")?,
            path: PathBuf::from(a.required("file")?),
        },
        "globes" => Command::Globes {
            user_id: a.optional(),
        },
        "public-globes" => Command::PublicGlobes,
        "likes" => Command::Likes {
            trip_id: a.required("trip-id")?,
        },
        "like" => Command::Like {
            trip_id: a.required("trip-id")?,
        },
        "unlike" => Command::Unlike {
            trip_id: a.required("trip-id")?,
        },
        other => return Err(Error::UnknownCommand(other.to_string())),
    };
    a.finish()?;

    Ok(Invocation {
        config_path,
        command,
    })
}

fn to_json<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run `command` and return what should be printed.
pub async fn execute(api: &TravelApi, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Help => Value::String(USAGE.to_string()),
        Command::Login { email, password } => {
            let response = api
                .auth
                .login(&UserCredentials::new(email, password))
                .await?;
            json!({ "logged_in": true, "user_id": response.account_id() })
        }
        Command::Register { email, password } => {
            let response = api
                .auth
                .register(&UserCredentials::new(email, password))
                .await?;
            json!({
                "registered": true,
                "user_id": response.account_id(),
                "logged_in": response.token.is_some(),
            })
        }
        Command::Logout => {
            api.auth.logout().await?;
            json!({ "logged_in": false })
        }
        Command::Whoami => {
            if !api.auth.is_logged_in().await? {
                json!({ "logged_in": false })
            } else {
                let user = api.auth.current_user().await?;
                json!({
                    "logged_in": true,
                    "user": user.user,
                    "cached_user_id": api.auth.cached_user_id().await?,
                })
            }
        }
        Command::Profile { user_id } => to_json(api.profile.get_profile_by_id(&user_id).await?)?,
        Command::Followers { profile_id } => {
            to_json(api.profile.get_followers(&profile_id).await?)?
        }
        Command::Following { profile_id } => {
            to_json(api.profile.get_following(&profile_id).await?)?
        }
        Command::Follow { user_id } => {
            api.profile.follow_user(&user_id).await?;
            json!({ "user_id": user_id, "following": true })
        }
        Command::Unfollow { user_id } => {
            api.profile.unfollow_user(&user_id).await?;
            json!({ "user_id": user_id, "following": false })
        }
        Command::SearchProfiles { query } => to_json(api.profile.search_profiles(&query).await?)?,
        Command::Trips { user_id: Some(id) } => {
            to_json(api.media.get_trips_by_user_id(&id).await?)?
        }
        Command::Trips { user_id: None } => to_json(api.media.get_my_trips().await?)?,
        Command::PublicTrips => to_json(api.media.get_public_trips().await?)?,
        Command::FollowingTrips => to_json(api.media.get_following_trips().await?)?,
        Command::TripMedia { trip_id } => to_json(api.media.get_trip_media(&trip_id).await?)?,
        Command::Upload { trip_id, path } => {
            let upload = MediaUpload::from_path(&path).await?;
            to_json(api.media.upload_media_to_trip(&trip_id, upload).await?)?
        }
        Command::Globes { user_id: Some(id) } => {
            to_json(api.globes.get_globes_by_user_id(&id).await?)?
        }
        Command::Globes { user_id: None } => to_json(api.globes.get_my_globes().await?)?,
        Command::PublicGlobes => to_json(api.globes.get_public_globes().await?)?,
        Command::Likes { trip_id } => to_json(api.likes.get_likes(&trip_id).await?)?,
        Command::Like { trip_id } => {
            api.likes.like_trip(&trip_id).await?;
            json!({ "trip_id": trip_id, "liked": true })
        }
        Command::Unlike { trip_id } => {
            api.likes.unlike_trip(&trip_id).await?;
            json!({ "trip_id": trip_id, "liked": false })
        }
    };
    Ok(output)
}
