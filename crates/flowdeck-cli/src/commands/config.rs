use flowdeck_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, ctx: &Context) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            cloud_url,
            cloud_token,
            user_id,
            no_activate,
        } => run_config_init(ctx, cloud_url, cloud_token, user_id, no_activate),
        ConfigCommands::Show => run_config_show(ctx),
    }
}

pub fn run_config_init(
    ctx: &Context,
    cloud_url: Option<String>,
    cloud_token: Option<String>,
    user_id: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(ctx.profile.as_deref());
    apply_profile_update(
        &mut config,
        &profile_name,
        cloud_url,
        cloud_token,
        user_id,
        no_activate,
    )?;

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    Ok(())
}

/// Merge explicit values into the named profile, keeping unset ones.
pub fn apply_profile_update(
    config: &mut CliProfilesConfig,
    profile_name: &str,
    cloud_url: Option<String>,
    cloud_token: Option<String>,
    user_id: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let cloud_url = normalize_text_option(cloud_url);
    if let Some(url) = cloud_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "cloud URL must include http:// or https://".to_string(),
            ));
        }
    }

    let profile = config.profile_mut_or_default(profile_name);
    if let Some(url) = cloud_url {
        profile.cloud_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(token) = normalize_text_option(cloud_token) {
        profile.cloud_token = Some(token);
    }
    if let Some(user_id) = normalize_text_option(user_id) {
        profile.user_id = Some(user_id);
    }

    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.to_string());
    }
    Ok(())
}

fn run_config_show(ctx: &Context) -> Result<(), CliError> {
    let resolved = ctx.resolved_profile()?;
    println!("db_path:   {}", ctx.db_path.display());
    println!("user_id:   {}", resolved.user_id);
    println!(
        "cloud_url: {}",
        resolved.cloud.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "token:     {}",
        if resolved.cloud.auth_token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    Ok(())
}
