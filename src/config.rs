use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config from {path}"))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::Config;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "outer_loop:\n  min_secs: 2.5\n  min_crosswalk_stops: 1\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.outer_loop.min_crosswalk_stops, 1);
        assert_eq!(cfg.crosswalk.red_area_threshold, 5_000);
        assert_eq!(cfg.start.ready_tick, 10);
    }
}
