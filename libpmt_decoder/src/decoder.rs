use super::board_db::{placeholder_name, BoardDatabase, BoardRecord};
use super::channel_map::ChannelLookup;
use super::config::Config;
use super::error::DecoderError;
use super::fragment::PmtFragment;
use super::waveform::Waveform;

/// Reconstruct the absolute start time of a board's waveforms along with the
/// name to report for the board. The start is the reference trigger time
/// minus the board trigger delay minus the pre trigger buffer duration; each
/// correction is zero when its source is unknown. A fragment from a board
/// with no record is fatal only when `require_known_boards` is set, otherwise
/// the trigger time is used uncorrected.
pub fn reconstruct_start_time(
    record: Option<&BoardRecord>,
    fragment_id: u32,
    trigger_time_ns: f64,
    require_known_boards: bool,
) -> Result<(String, f64), DecoderError> {
    let Some(record) = record else {
        if require_known_boards {
            return Err(DecoderError::UnknownBoard(fragment_id));
        }
        return Ok((placeholder_name(fragment_id), trigger_time_ns));
    };
    let start_time_ns = trigger_time_ns - record.trigger_delay_ns() - record.pre_trigger_ns();
    Ok((record.display_name(), start_time_ns))
}

/// PmtDecoder takes raw fragment records and composes them into events.
///
/// The decoder owns the frozen board database and the decode policy, and
/// accumulates the waveforms of the event currently being decoded. Consecutive
/// fragments sharing an event counter belong to the same event; a counter
/// change on an incoming fragment closes the event being built.
pub struct PmtDecoder {
    current_event_id: Option<u32>,
    board_db: BoardDatabase,
    trigger_time_ns: f64,
    require_known_boards: bool,
    diagnostic_output: bool,
    event_waveforms: Vec<Waveform>,
}

impl PmtDecoder {
    /// Create a decoder from a resolved board database, logging a summary of
    /// the decode configuration
    pub fn new(board_db: BoardDatabase, config: &Config) -> Self {
        spdlog::info!(
            "PMT decoder configured with {} known boards, trigger reference {} ns",
            board_db.len(),
            config.trigger_time_ns
        );
        for record in board_db.records() {
            if record.is_configured() {
                spdlog::info!(
                    "  board {} -> fragment ID {}, trigger delay {} ns, pre trigger {} ns",
                    record.display_name(),
                    record.fragment_id,
                    record.trigger_delay_ns(),
                    record.pre_trigger_ns()
                );
            } else {
                spdlog::info!(
                    "  board {} -> fragment ID {}, trigger delay {} ns, no pre trigger correction",
                    record.display_name(),
                    record.fragment_id,
                    record.trigger_delay_ns()
                );
            }
        }
        if !config.require_known_boards {
            spdlog::info!("Fragments from unknown boards will be decoded without corrections");
        }

        Self {
            current_event_id: None,
            board_db,
            trigger_time_ns: config.trigger_time_ns,
            require_known_boards: config.require_known_boards,
            diagnostic_output: config.diagnostic_output,
            event_waveforms: Vec::new(),
        }
    }

    /// Decode one raw fragment record into the current event.
    ///
    /// If the fragment does not carry the same event counter as the event
    /// currently being built, this is taken as indication that that event is
    /// complete, and a new event should be started for the fragment given.
    /// Returns a `Result<Option<(u32, Vec<Waveform>)>>`. If the Option is None,
    /// the event being built is not complete. If the Option is Some, it holds
    /// the completed event id and its waveforms sorted by PMT channel.
    ///
    /// A fragment with no channel mapping is dropped with an error log; that
    /// loses this fragment's data but is not fatal to the run. A malformed
    /// record, an event counter running backwards, or (when required) an
    /// unknown board is fatal.
    #[allow(clippy::comparison_chain)]
    pub fn process_fragment<M: ChannelLookup>(
        &mut self,
        buf: &[u8],
        channel_map: &M,
    ) -> Result<Option<(u32, Vec<Waveform>)>, DecoderError> {
        let fragment = PmtFragment::parse(buf)?;
        let effective_id = fragment.effective_fragment_id();

        if self.diagnostic_output {
            spdlog::info!(
                "Fragment ID {} (effective {}): {} channels, {} samples per channel, event size {} words, TTT {}",
                fragment.header.fragment_id,
                effective_id,
                fragment.header.n_channels,
                fragment.samples_per_channel,
                fragment.header.event_size_words,
                fragment.header.trigger_time_tag
            );
        }

        let completed = if let Some(current_id) = self.current_event_id {
            if fragment.header.event_counter < current_id {
                // Some how we recieved a fragment from a past event
                return Err(DecoderError::EventOutOfOrder(
                    fragment.header.event_counter,
                    current_id,
                ));
            } else if fragment.header.event_counter > current_id {
                // A fragment from the next event; emit the built event and start a new one
                self.current_event_id = Some(fragment.header.event_counter);
                Some((current_id, self.finalize_event()))
            } else {
                None
            }
        } else {
            // This is the first fragment ever in history
            self.current_event_id = Some(fragment.header.event_counter);
            None
        };

        let Some(pairs) = channel_map.board_channels(effective_id) else {
            spdlog::error!(
                "No channel mapping for effective fragment ID {}; fragment dropped",
                effective_id
            );
            return Ok(completed);
        };

        let record = self.board_db.find(fragment.header.fragment_id);
        let (board_name, start_time_ns) = reconstruct_start_time(
            record,
            fragment.header.fragment_id,
            self.trigger_time_ns,
            self.require_known_boards,
        )?;

        spdlog::trace!(
            "Board {}: start time {} ns = {} - {} - {}",
            board_name,
            start_time_ns,
            self.trigger_time_ns,
            record.map(|rec| rec.trigger_delay_ns()).unwrap_or(0.0),
            record.map(|rec| rec.pre_trigger_ns()).unwrap_or(0.0)
        );

        for (digitizer_channel, pmt_channel) in pairs {
            match fragment.channel_samples(*digitizer_channel) {
                Some(samples) => {
                    self.event_waveforms
                        .push(Waveform::new(start_time_ns, *pmt_channel, samples))
                }
                None => spdlog::error!(
                    "Channel {} of board {} is outside the fragment payload; channel skipped",
                    digitizer_channel,
                    board_name
                ),
            }
        }

        if self.diagnostic_output {
            spdlog::info!("Waveforms now in event: {}", self.event_waveforms.len());
        }
        Ok(completed)
    }

    /// Takes the event currently being built and flushes it.
    ///
    /// Used at the end of processing a run.
    /// Returns None if no fragment was ever decoded.
    pub fn flush_final_event(&mut self) -> Option<(u32, Vec<Waveform>)> {
        self.current_event_id
            .take()
            .map(|event_id| (event_id, self.finalize_event()))
    }

    /// Close out the current event: waveforms are sorted by PMT channel and
    /// moved out, leaving the decoder ready for the next event
    fn finalize_event(&mut self) -> Vec<Waveform> {
        self.event_waveforms.sort_by_key(|wave| wave.channel);
        std::mem::take(&mut self.event_waveforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board_config::BoardConfig;
    use crate::config::BoardSetup;
    use crate::constants::*;

    struct TestMap {
        board: u32,
        pairs: Vec<(usize, u32)>,
    }

    impl ChannelLookup for TestMap {
        fn board_channels(&self, effective_fragment_id: u32) -> Option<&[(usize, u32)]> {
            (effective_fragment_id == self.board).then(|| self.pairs.as_slice())
        }
    }

    fn make_fragment(
        fragment_id: u16,
        n_channels: u16,
        event_counter: u32,
        samples: &[u16],
    ) -> Vec<u8> {
        let event_size = HEADER_SIZE_WORDS + (samples.len() / 2) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&fragment_id.to_le_bytes());
        buf.extend_from_slice(&n_channels.to_le_bytes());
        buf.extend_from_slice(
            &((EXPECTED_HEADER_MARKER << HEADER_MARKER_SHIFT) | event_size).to_le_bytes(),
        );
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&event_counter.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for sample in samples {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    /// One configured board: fragment ID 0x2001, 43 ns delay, 2000 ns pre trigger
    fn make_db() -> BoardDatabase {
        let setups = vec![BoardSetup {
            name: String::from("pmt01"),
            fragment_id: Some(0x2001),
            trigger_delay_ns: 43.0,
        }];
        let configs = vec![BoardConfig {
            board_name: String::from("pmt01"),
            fragment_id: 0x2001,
            buffer_length: 4000,
            post_trigger_frac: 0.75,
        }];
        BoardDatabase::resolve(&setups, Some(&configs), true, 2.0)
            .expect("Resolution should succeed")
    }

    fn make_decoder_config(require_known_boards: bool) -> Config {
        Config {
            trigger_time_ns: 1000.0,
            require_known_boards,
            ..Default::default()
        }
    }

    fn make_map() -> TestMap {
        TestMap {
            board: 0x001,
            pairs: vec![(0, 101), (1, 102)],
        }
    }

    #[test]
    fn test_reconstruct_with_record() {
        let db = make_db();
        let (name, start) =
            reconstruct_start_time(db.find(0x2001), 0x2001, 1000.0, true).expect("Board is known");
        assert_eq!(name, "pmt01");
        assert_eq!(start, -1043.0);
    }

    #[test]
    fn test_reconstruct_unknown_board_fatal() {
        let result = reconstruct_start_time(None, 0x2001, 1000.0, true);
        assert!(matches!(result, Err(DecoderError::UnknownBoard(0x2001))));
    }

    #[test]
    fn test_reconstruct_unknown_board_relaxed() {
        let (name, start) =
            reconstruct_start_time(None, 0x2001, 1000.0, false).expect("Unknown boards allowed");
        assert_eq!(name, "<ID=8193>");
        assert_eq!(start, 1000.0);
    }

    #[test]
    fn test_reconstruct_setup_only_record() {
        // No DAQ configuration at all: only the trigger delay is corrected
        let setups = vec![BoardSetup {
            name: String::from("pmt01"),
            fragment_id: Some(0x2001),
            trigger_delay_ns: 43.0,
        }];
        let db =
            BoardDatabase::resolve(&setups, None, true, 2.0).expect("Resolution should succeed");
        let (name, start) =
            reconstruct_start_time(db.find(0x2001), 0x2001, 1000.0, true).expect("Board is known");
        assert_eq!(name, "<ID=8193>");
        assert_eq!(start, 957.0);
    }

    #[test]
    fn test_round_trip_two_channels() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);

        let completed = decoder
            .process_fragment(&buf, &make_map())
            .expect("Fragment should decode");
        assert!(completed.is_none());

        let (event_id, waveforms) = decoder.flush_final_event().expect("An event was built");
        assert_eq!(event_id, 0);
        assert_eq!(
            waveforms,
            vec![
                Waveform::new(-1043.0, 101, vec![1, 2, 3, 4]),
                Waveform::new(-1043.0, 102, vec![5, 6, 7, 8]),
            ]
        );
    }

    #[test]
    fn test_finalize_sorts_by_channel() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);
        // Map emits the higher PMT channel first
        let map = TestMap {
            board: 0x001,
            pairs: vec![(1, 102), (0, 101)],
        };

        decoder
            .process_fragment(&buf, &map)
            .expect("Fragment should decode");
        let (_, waveforms) = decoder.flush_final_event().expect("An event was built");

        assert_eq!(waveforms.len(), 2);
        assert_eq!(waveforms[0].channel, 101);
        assert_eq!(waveforms[0].samples, vec![1, 2, 3, 4]);
        assert_eq!(waveforms[1].channel, 102);
    }

    #[test]
    fn test_fragments_accumulate_within_event() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 7, &samples);

        assert!(decoder
            .process_fragment(&buf, &make_map())
            .expect("Fragment should decode")
            .is_none());
        assert!(decoder
            .process_fragment(&buf, &make_map())
            .expect("Fragment should decode")
            .is_none());

        let (event_id, waveforms) = decoder.flush_final_event().expect("An event was built");
        assert_eq!(event_id, 7);
        assert_eq!(waveforms.len(), 4);
    }

    #[test]
    fn test_counter_change_completes_event() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let first = make_fragment(0x2001, 2, 0, &samples);
        let second = make_fragment(0x2001, 2, 1, &samples);

        assert!(decoder
            .process_fragment(&first, &make_map())
            .expect("Fragment should decode")
            .is_none());
        let (event_id, waveforms) = decoder
            .process_fragment(&second, &make_map())
            .expect("Fragment should decode")
            .expect("Counter change should complete the first event");
        assert_eq!(event_id, 0);
        assert_eq!(waveforms.len(), 2);

        let (event_id, waveforms) = decoder.flush_final_event().expect("An event was built");
        assert_eq!(event_id, 1);
        assert_eq!(waveforms.len(), 2);
    }

    #[test]
    fn test_out_of_order_event_fatal() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let first = make_fragment(0x2001, 2, 5, &samples);
        let stale = make_fragment(0x2001, 2, 3, &samples);

        decoder
            .process_fragment(&first, &make_map())
            .expect("Fragment should decode");
        let result = decoder.process_fragment(&stale, &make_map());
        assert!(matches!(result, Err(DecoderError::EventOutOfOrder(3, 5))));
    }

    #[test]
    fn test_unmapped_fragment_dropped() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);
        let map = TestMap {
            board: 0x555,
            pairs: vec![(0, 101)],
        };

        decoder
            .process_fragment(&buf, &map)
            .expect("Unmapped fragments are not fatal");
        let (event_id, waveforms) = decoder.flush_final_event().expect("The event still opened");
        assert_eq!(event_id, 0);
        assert!(waveforms.is_empty());
    }

    #[test]
    fn test_unknown_board_fatal_when_required() {
        let setups: Vec<BoardSetup> = Vec::new();
        let db = BoardDatabase::resolve(&setups, None, true, 2.0).expect("Empty setup is valid");
        let mut decoder = PmtDecoder::new(db, &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);

        let result = decoder.process_fragment(&buf, &make_map());
        assert!(matches!(result, Err(DecoderError::UnknownBoard(0x2001))));
        let (_, waveforms) = decoder.flush_final_event().expect("The event still opened");
        assert!(waveforms.is_empty());
    }

    #[test]
    fn test_unknown_board_decoded_uncorrected() {
        let setups: Vec<BoardSetup> = Vec::new();
        let db = BoardDatabase::resolve(&setups, None, true, 2.0).expect("Empty setup is valid");
        let mut decoder = PmtDecoder::new(db, &make_decoder_config(false));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);

        decoder
            .process_fragment(&buf, &make_map())
            .expect("Unknown boards allowed");
        let (_, waveforms) = decoder.flush_final_event().expect("An event was built");
        assert_eq!(waveforms.len(), 2);
        assert_eq!(waveforms[0].start_time_ns, 1000.0);
    }

    #[test]
    fn test_malformed_fragment_emits_nothing() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        // 8 samples cannot divide across 3 channels
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 3, 0, &samples);

        let result = decoder.process_fragment(&buf, &make_map());
        assert!(matches!(result, Err(DecoderError::BadFragment(_))));
        assert!(decoder.flush_final_event().is_none());
    }

    #[test]
    fn test_out_of_range_channel_skipped() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);
        let map = TestMap {
            board: 0x001,
            pairs: vec![(0, 101), (7, 909)],
        };

        decoder
            .process_fragment(&buf, &map)
            .expect("Fragment should decode");
        let (_, waveforms) = decoder.flush_final_event().expect("An event was built");
        assert_eq!(waveforms.len(), 1);
        assert_eq!(waveforms[0].channel, 101);
    }

    #[test]
    fn test_flush_resets_decoder() {
        let mut decoder = PmtDecoder::new(make_db(), &make_decoder_config(true));
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, &samples);

        decoder
            .process_fragment(&buf, &make_map())
            .expect("Fragment should decode");
        assert!(decoder.flush_final_event().is_some());
        assert!(decoder.flush_final_event().is_none());
    }
}
