use sampledex_core::paths::{to_drive_style, to_drive_style_forward, to_file_url, to_mount_style};

pub fn to_mount(path: &str) {
    println!("{}", to_mount_style(path));
}

pub fn to_drive(path: &str, forward: bool) {
    if forward {
        println!("{}", to_drive_style_forward(path));
    } else {
        println!("{}", to_drive_style(path));
    }
}

pub fn to_url(path: &str) {
    println!("{}", to_file_url(path));
}
