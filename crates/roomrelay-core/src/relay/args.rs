//! Transcoder command line.

use crate::config::TranscoderSettings;

/// `[extra_input_args..] -i <input> -ar <rate> -vcodec <codec> -r <fps> -b:v <bitrate> -f <format> <destination>`
pub fn transcoder_args(settings: &TranscoderSettings, input: &str, destination: &str) -> Vec<String> {
    let mut args: Vec<String> = settings.extra_input_args.clone();
    args.extend([
        "-i".to_string(),
        input.to_string(),
        "-ar".to_string(),
        settings.audio_sample_rate.to_string(),
        "-vcodec".to_string(),
        settings.video_codec.clone(),
        "-r".to_string(),
        settings.frame_rate.to_string(),
        "-b:v".to_string(),
        settings.video_bitrate.clone(),
        "-f".to_string(),
        settings.format.clone(),
        destination.to_string(),
    ]);
    args
}
