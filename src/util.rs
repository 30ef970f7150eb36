const GITHUB_TOKEN: &str = "GITHUB_TOKEN";

const OPENWEATHER_API_KEY: &str = "OPENWEATHER_API_KEY";

const HUB_ENV: &str = "HUB_ENV";

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn get_github_token() -> Option<String> {
    non_empty_var(GITHUB_TOKEN)
}

pub fn get_openweather_api_key() -> Option<String> {
    non_empty_var(OPENWEATHER_API_KEY)
}

/// Deployment environment override (`dev` enables trace logging)
pub fn get_env() -> Option<String> {
    non_empty_var(HUB_ENV)
}
