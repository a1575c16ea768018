use super::board_config::BoardConfig;
use super::config::BoardSetup;
use super::error::BoardDatabaseError;

/// Timing facts derived from a board's DAQ configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BoardFacts {
    pub pre_trigger_ns: f64,
}

/// Where the knowledge of a board came from. A board declared in the setup
/// list may or may not have a matching DAQ configuration entry; only
/// configured boards carry buffer sizing facts.
#[derive(Debug, Clone)]
pub enum BoardSource {
    SetupOnly,
    Configured {
        config: BoardConfig,
        facts: BoardFacts,
    },
}

/// The resolved record for one physical board, keyed by fragment ID
#[derive(Debug, Clone)]
pub struct BoardRecord {
    pub fragment_id: u32,
    pub setup: BoardSetup,
    pub source: BoardSource,
}

/// Display name used for boards with no configured name
pub fn placeholder_name(fragment_id: u32) -> String {
    format!("<ID={fragment_id}>")
}

impl BoardRecord {
    /// The configured board name, or a placeholder carrying the fragment ID
    /// when the board was never matched to a DAQ configuration entry
    pub fn display_name(&self) -> String {
        match &self.source {
            BoardSource::Configured { config, .. } => config.board_name.clone(),
            BoardSource::SetupOnly => placeholder_name(self.fragment_id),
        }
    }

    pub fn trigger_delay_ns(&self) -> f64 {
        self.setup.trigger_delay_ns
    }

    /// Duration of the pre trigger readout buffer; zero when the board has no
    /// DAQ configuration entry
    pub fn pre_trigger_ns(&self) -> f64 {
        match &self.source {
            BoardSource::Configured { facts, .. } => facts.pre_trigger_ns,
            BoardSource::SetupOnly => 0.0,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.source, BoardSource::Configured { .. })
    }
}

/// The set of boards known for a run, resolved once from the setup list and
/// the (optional) DAQ configuration snapshot, then frozen. Records are stored
/// sorted by fragment ID so lookup during decoding is a binary search.
#[derive(Debug)]
pub struct BoardDatabase {
    records: Vec<BoardRecord>,
}

impl BoardDatabase {
    /// Merge the user setup list with the DAQ configuration into the board
    /// records used for decoding. The setup list decides which boards exist;
    /// the configuration, when present, decides fragment IDs and buffer
    /// sizing. The two sources are joined by board name.
    ///
    /// Conflicting fragment IDs between the two sources and duplicate
    /// resolved fragment IDs are fatal. A board missing from a present
    /// configuration is fatal when `require_board_config` is set, otherwise
    /// it falls back to the setup-declared fragment ID (or is skipped with a
    /// warning when it has none). The result depends only on the contents of
    /// the two lists, not on their order.
    pub fn resolve(
        setups: &[BoardSetup],
        configs: Option<&[BoardConfig]>,
        require_board_config: bool,
        sampling_tick_ns: f64,
    ) -> Result<Self, BoardDatabaseError> {
        let mut config_index: Vec<&BoardConfig> = configs.unwrap_or(&[]).iter().collect();
        config_index.sort_by(|a, b| a.board_name.cmp(&b.board_name));

        let mut records: Vec<BoardRecord> = Vec::with_capacity(setups.len());
        for setup in setups {
            let board_config = config_index
                .binary_search_by(|probe| probe.board_name.as_str().cmp(setup.name.as_str()))
                .ok()
                .map(|idx| config_index[idx]);

            let fragment_id = match board_config {
                Some(config) => {
                    if let Some(setup_id) = setup.fragment_id {
                        if setup_id != config.fragment_id {
                            return Err(BoardDatabaseError::ConfigConflict(
                                setup.name.clone(),
                                setup_id,
                                config.fragment_id,
                            ));
                        }
                    }
                    config.fragment_id
                }
                None => {
                    if configs.is_some() {
                        if require_board_config {
                            return Err(BoardDatabaseError::MissingBoardConfig(setup.name.clone()));
                        }
                        spdlog::warn!("No DAQ configuration found for board {}", setup.name);
                    }
                    match setup.fragment_id {
                        Some(id) => {
                            spdlog::warn!(
                                "Board {} is not configured; some time stamp corrections will be skipped",
                                setup.name
                            );
                            id
                        }
                        None => {
                            spdlog::warn!(
                                "No fragment ID known for board {}; it will not be decoded",
                                setup.name
                            );
                            continue;
                        }
                    }
                }
            };

            let source = match board_config {
                Some(config) => BoardSource::Configured {
                    facts: BoardFacts {
                        pre_trigger_ns: config.pre_trigger_ns(sampling_tick_ns),
                    },
                    config: config.clone(),
                },
                None => BoardSource::SetupOnly,
            };

            records.push(BoardRecord {
                fragment_id,
                setup: setup.clone(),
                source,
            });
        }

        records.sort_by_key(|rec| rec.fragment_id);
        if let Some(pair) = records
            .windows(2)
            .find(|pair| pair[0].fragment_id == pair[1].fragment_id)
        {
            return Err(BoardDatabaseError::DuplicateFragmentId(
                pair[0].setup.name.clone(),
                pair[1].setup.name.clone(),
                pair[0].fragment_id,
            ));
        }

        Ok(Self { records })
    }

    /// Look up the record for a fragment ID
    pub fn find(&self, fragment_id: u32) -> Option<&BoardRecord> {
        self.records
            .binary_search_by_key(&fragment_id, |rec| rec.fragment_id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn records(&self) -> &[BoardRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
