use cymru_enrich::EnrichConfig;

pub fn run(config: &EnrichConfig) {
    println!("{}", config.summary());
}
