//! Directory scan, program upload, and download against a simulated
//! SLC 5/03 whose file 0 holds one ladder file and two data tables.

mod support;

use std::sync::{Arc, Mutex};

use df1_checksums::ChecksumKind;
use df1_core::{Client, ClientConfig, ClientEvent, EventChannel};

use support::{ScriptedTransport, ack};

const KIND: ChecksumKind = ChecksumKind::Crc16;

/// SLC 5/03 directory geometry: table at offset 103, 10-byte entries.
const TABLE_OFFSET: usize = 103;
const STRIDE: usize = 10;

fn file_zero_image() -> Vec<u8> {
    let mut zero = vec![0u8; TABLE_OFFSET + 3 * STRIDE];
    let entries: [(u8, u16); 3] = [
        (0x22, 20), // ladder program file
        (0x89, 8),  // N, four elements
        (0x86, 12), // T, two elements
    ];
    for (index, (code, length)) in entries.iter().enumerate() {
        let at = TABLE_OFFSET + index * STRIDE;
        zero[at] = *code;
        zero[at + 1..at + 3].copy_from_slice(&length.to_le_bytes());
    }
    zero
}

/// Simulates the controller: status probes, logical reads served from the
/// file-zero image (zeroes elsewhere), every write accepted.
fn simulated_plc(requests: Arc<Mutex<Vec<Vec<u8>>>>) -> Arc<ScriptedTransport> {
    let zero = file_zero_image();
    ScriptedTransport::new(move |_, bytes, _| {
        let Some(body) = support::unframe(bytes, KIND) else {
            return Vec::new();
        };
        requests.lock().unwrap().push(body.clone());
        match (body[2], body.get(6).copied()) {
            (0x06, _) => vec![ack(), support::status_reply(&body, 0x49, KIND)],
            (0x0F, Some(0xA1 | 0xA2)) => {
                let size = usize::from(body[7]);
                let file_type = body[9];
                let element = body[10];
                let data = if file_type == 0x01 && element == 0x23 {
                    (zero.len() as u16).to_le_bytes().to_vec()
                } else if file_type == 0x01 && element == 0x00 {
                    zero[..size].to_vec()
                } else {
                    vec![0u8; size]
                };
                vec![ack(), support::reply_frame(&body, 0, &data, KIND)]
            }
            (0x0F, _) => vec![ack(), support::reply_frame(&body, 0, &[], KIND)],
            _ => vec![ack()],
        }
    })
}

#[test]
fn data_tables_come_from_the_descriptor_scan() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let transport = simulated_plc(Arc::clone(&requests));
    let config = ClientConfig::builder().port("scripted").max_ticks(2).build();
    let client = Client::with_transport(config, transport);

    let tables = client.data_tables().expect("scan succeeds");
    assert_eq!(tables.len(), 2);
    assert_eq!((tables[0].tag(), tables[0].file_number()), ("N", 0));
    assert_eq!(tables[0].element_count(), 4);
    assert_eq!((tables[1].tag(), tables[1].file_number()), ("T", 1));
    assert_eq!(tables[1].element_count(), 2);
}

#[test]
fn upload_returns_the_directory_and_every_program_file() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let transport = simulated_plc(Arc::clone(&requests));
    let (observer, events) = EventChannel::unbounded();
    let config = ClientConfig::builder().port("scripted").max_ticks(2).build();
    let client = Client::with_observer(config, transport as _, observer);

    let image = client.upload_program().expect("upload succeeds");
    assert_eq!(image.directory(), file_zero_image());

    let lengths: Vec<usize> = image.files().iter().map(|file| file.data().len()).collect();
    assert_eq!(lengths, vec![20, 8, 12]);
    assert_eq!(image.files()[0].type_code(), 0x22);
    assert_eq!(image.files()[0].file_number(), 0);
    // Data-range program files number independently of the ladder group.
    assert_eq!(image.files()[1].file_number(), 0);
    assert_eq!(image.files()[2].file_number(), 1);

    let progress: Vec<(usize, usize)> = events
        .try_iter()
        .filter_map(|event| match event {
            ClientEvent::UploadProgress { done, total } => Some((done, total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn download_runs_the_interlocked_sequence_in_order() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let transport = simulated_plc(Arc::clone(&requests));
    let (observer, events) = EventChannel::unbounded();
    let config = ClientConfig::builder().port("scripted").max_ticks(2).build();
    let client = Client::with_observer(config, transport as _, observer);

    let image = client.upload_program().expect("upload succeeds");
    let uploads = requests.lock().unwrap().len();
    client.download_program(&image).expect("download succeeds");

    let all_requests = requests.lock().unwrap().clone();
    let download_functions: Vec<u8> = all_requests[uploads..]
        .iter()
        .filter(|body| body[2] == 0x0F)
        .map(|body| body[6])
        .collect();

    // Mode change, pre-download header read, command list, sole access,
    // directory length + contents, three files, completion, release.
    assert_eq!(
        download_functions,
        vec![0x80, 0xA1, 0x88, 0x11, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0x52, 0x12]
    );

    let progress: Vec<(usize, usize)> = events
        .try_iter()
        .filter_map(|event| match event {
            ClientEvent::DownloadProgress { done, total } => Some((done, total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
}
