//! About page.

const TITLE: &str = "About Kartik's Blog app";

const BODY: &str = "Welcome to Kartik's Blog app! This blog was created by Kartik Goswami \
as an internship project given by Zidio Development.";

pub fn show() {
    println!("{TITLE}");
    println!();
    println!("{BODY}");
}
