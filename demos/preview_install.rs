use archive_fs::{ArchiveFS, ArchivePath, Fsck, FsckConfig, Overwrite, PurePath};

fn main() {
    // file list as an extractor would report it; note the extra wrapping folder
    // and the inconsistent casing
    let listing = [
        "SkyMod v2/Meshes/Armor/helm.nif",
        "SkyMod v2/meshes/armor/boots.nif",
        "SkyMod v2/Textures/armor/helm.dds",
        "SkyMod v2/SkyMod.esp",
        "SkyMod v2/Readme.txt",
    ];

    let mut fs = ArchiveFS::new();
    for entry in listing {
        fs.touch(entry).unwrap();
    }
    println!("{fs:?}");

    let fsck = Fsck::new(FsckConfig::default());
    let root = PurePath::root();
    println!("installable as-is: {}", fsck.quick_check(&fs, &root).unwrap());

    // the full check looks one level down and finds the real data root
    let report = fsck.full_check(&fs, &root).unwrap();
    println!("data found under {}: {:?}", report.root, report.folders);

    // keep the extracted layout around to compare against
    let baseline = fs.duplicate();

    // hoist everything out of the wrapper, then drop it
    let fs = fs.shared();
    let wrapper = ArchivePath::new(&fs, &report.root);
    for child in wrapper.listdir().unwrap() {
        child.move_to("/", Overwrite::MERGE).unwrap();
    }
    wrapper.rmdir().unwrap();
    assert!(fsck.quick_check(&*fs.borrow(), &root).unwrap());

    // the plugin gets a cleaner name; its inode does not change
    let plugin = ArchivePath::new(&fs, "/skymod.esp");
    let inode = plugin.inode().unwrap();
    let plugin = plugin
        .chname("SkyMod - Armor.esp", Overwrite::PROMPT)
        .unwrap()
        .unwrap();
    assert_eq!(plugin.inode().unwrap(), inode);

    println!("before:");
    for path in baseline.walk_tree("/", false, true).unwrap() {
        println!("  {path}");
    }
    println!("after:");
    for path in ArchivePath::root(&fs).walk(false, true).unwrap() {
        println!("  {path}");
    }

    // meshes only, re-rooted
    let meshes = fs.borrow().derive_subtree("/meshes").unwrap();
    println!("meshes archive holds {} entries", meshes.len() - 1);
}
